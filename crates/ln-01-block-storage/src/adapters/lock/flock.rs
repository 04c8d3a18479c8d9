//! # File Lock Implementation
//!
//! Uses `fs2` for cross-platform file locking (flock on Unix, LockFile on
//! Windows). Each lock name maps to `<dir>/<name>.lock`; the open handle is
//! kept while the lock is held. Lock files are never removed, so two
//! processes always contend on the same inode.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::Mutex;

use crate::domain::errors::LockError;
use crate::ports::outbound::AdvisoryLock;

/// Advisory lock shared by every process using the same directory.
pub struct FileLock {
    dir: PathBuf,
    held: Mutex<HashMap<String, File>>,
}

impl FileLock {
    /// Lock files live in `dir`, which is created if missing.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, LockError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(backend)?;
        Ok(Self {
            dir,
            held: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.lock"))
    }
}

fn backend(err: std::io::Error) -> LockError {
    LockError::Backend {
        message: err.to_string(),
    }
}

impl AdvisoryLock for FileLock {
    fn try_acquire(&self, name: &str) -> Result<(), LockError> {
        let mut held = self.held.lock();
        if held.contains_key(name) {
            return Err(LockError::AlreadyLocked {
                name: name.to_owned(),
            });
        }

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.path(name))
            .map_err(backend)?;

        // Try to acquire exclusive lock (non-blocking)
        if file.try_lock_exclusive().is_err() {
            return Err(LockError::AlreadyLocked {
                name: name.to_owned(),
            });
        }

        // PID is informational only
        file.set_len(0).map_err(backend)?;
        writeln!(file, "{}", std::process::id()).map_err(backend)?;

        held.insert(name.to_owned(), file);
        Ok(())
    }

    fn release(&self, name: &str) -> Result<(), LockError> {
        let file = self
            .held
            .lock()
            .remove(name)
            .ok_or_else(|| LockError::NotLocked {
                name: name.to_owned(),
            })?;
        FileExt::unlock(&file).map_err(backend)
    }

    /// Probes other holders with a shared lock. Concurrent probes never
    /// conflict, but a `try_acquire` racing a probe sees `AlreadyLocked` for
    /// the instant the shared lock is held.
    fn is_locked(&self, name: &str) -> Result<bool, LockError> {
        if self.held.lock().contains_key(name) {
            return Ok(true);
        }
        let path = self.path(name);
        if !path.exists() {
            return Ok(false);
        }
        let file = File::open(&path).map_err(backend)?;
        match file.try_lock_shared() {
            Ok(()) => {
                FileExt::unlock(&file).map_err(backend)?;
                Ok(false)
            }
            Err(_) => Ok(true),
        }
    }
}
