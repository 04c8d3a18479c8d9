//! # Named Lock
//!
//! Fail-fast mutual exclusion around one named resource. A successful
//! [`NamedLock::acquire`] returns a [`LockGuard`]; dropping the guard
//! releases the lock.

use std::fmt;
use std::sync::Arc;

use crate::domain::errors::LockError;
use crate::ports::outbound::AdvisoryLock;

/// Name of the lock serializing block appension.
pub const BLOCK_LOCK: &str = "block";

/// Handle to one named advisory lock.
#[derive(Clone)]
pub struct NamedLock {
    name: String,
    backend: Arc<dyn AdvisoryLock>,
}

impl fmt::Debug for NamedLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedLock").field("name", &self.name).finish()
    }
}

impl NamedLock {
    pub fn new(name: impl Into<String>, backend: Arc<dyn AdvisoryLock>) -> Self {
        Self {
            name: name.into(),
            backend,
        }
    }

    /// The `"block"` lock on `backend`.
    pub fn block(backend: Arc<dyn AdvisoryLock>) -> Self {
        Self::new(BLOCK_LOCK, backend)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Take the lock or fail immediately with `AlreadyLocked`.
    pub fn acquire(&self) -> Result<LockGuard, LockError> {
        self.backend.try_acquire(&self.name)?;
        tracing::trace!("[ln-01] Acquired lock '{}'", self.name);
        Ok(LockGuard {
            lock: self.clone(),
            released: false,
        })
    }

    /// Assert an outer caller already holds the lock, without taking it.
    pub fn expect_locked(&self) -> Result<(), LockError> {
        if self.backend.is_locked(&self.name)? {
            Ok(())
        } else {
            Err(LockError::NotLocked {
                name: self.name.clone(),
            })
        }
    }

    pub fn is_locked(&self) -> Result<bool, LockError> {
        self.backend.is_locked(&self.name)
    }
}

/// A held lock. Released explicitly with [`LockGuard::release`] or on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
    lock: NamedLock,
    released: bool,
}

impl LockGuard {
    pub fn name(&self) -> &str {
        self.lock.name()
    }

    /// Release now and report backend failures.
    pub fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        self.lock.backend.release(&self.lock.name)?;
        tracing::trace!("[ln-01] Released lock '{}'", self.lock.name);
        Ok(())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.lock.backend.release(&self.lock.name) {
            tracing::error!("[ln-01] Failed to release lock '{}': {}", self.lock.name, err);
        }
    }
}
