//! # Lock Tests

use std::sync::{Arc, Barrier};
use std::thread;

use parking_lot::RwLock;

use super::*;
use crate::adapters::storage::InMemoryKVStore;
use crate::domain::errors::LockError;
use crate::ports::outbound::AdvisoryLock;
use crate::service::lock::NamedLock;

fn store_lock() -> Arc<dyn AdvisoryLock> {
    Arc::new(StoreLock::new(Arc::new(RwLock::new(InMemoryKVStore::new()))))
}

fn backends() -> Vec<(Arc<dyn AdvisoryLock>, Option<tempfile::TempDir>)> {
    let dir = tempfile::tempdir().unwrap();
    let file: Arc<dyn AdvisoryLock> = Arc::new(FileLock::new(dir.path()).unwrap());
    vec![(store_lock(), None), (file, Some(dir))]
}

#[test]
fn test_double_acquire_fails() {
    for (backend, _dir) in backends() {
        let lock = NamedLock::block(backend);
        let guard = lock.acquire().expect("first acquire");
        assert!(matches!(
            lock.acquire(),
            Err(LockError::AlreadyLocked { .. })
        ));
        guard.release().unwrap();
        lock.acquire().expect("acquire after release").release().unwrap();
    }
}

#[test]
fn test_release_without_hold_is_integrity_error() {
    for (backend, _dir) in backends() {
        assert!(matches!(
            backend.release("block"),
            Err(LockError::NotLocked { .. })
        ));
    }
}

#[test]
fn test_expect_locked() {
    for (backend, _dir) in backends() {
        let lock = NamedLock::block(backend);
        assert!(matches!(
            lock.expect_locked(),
            Err(LockError::NotLocked { .. })
        ));
        let guard = lock.acquire().unwrap();
        lock.expect_locked().unwrap();
        drop(guard);
        assert!(!lock.is_locked().unwrap());
    }
}

#[test]
fn test_guard_drop_releases() {
    for (backend, _dir) in backends() {
        let lock = NamedLock::block(backend);
        {
            let _guard = lock.acquire().unwrap();
            assert!(lock.is_locked().unwrap());
        }
        assert!(!lock.is_locked().unwrap());
    }
}

#[test]
fn test_names_are_independent() {
    for (backend, _dir) in backends() {
        let block = NamedLock::new("block", backend.clone());
        let other = NamedLock::new("other", backend);
        let _a = block.acquire().unwrap();
        let _b = other.acquire().unwrap();
    }
}

#[test]
fn test_race_has_exactly_one_winner() {
    for (backend, _dir) in backends() {
        let lock = NamedLock::block(backend);
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lock = lock.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    // Keep the winner's guard alive until every thread has tried.
                    let result = lock.acquire();
                    barrier.wait();
                    result.is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        lock.acquire().expect("lock free after the race").release().unwrap();
    }
}

#[test]
fn test_file_lock_visible_to_second_instance() {
    let dir = tempfile::tempdir().unwrap();
    let first = FileLock::new(dir.path()).unwrap();
    let second = FileLock::new(dir.path()).unwrap();

    first.try_acquire("block").unwrap();
    assert!(second.is_locked("block").unwrap());
    assert!(matches!(
        second.try_acquire("block"),
        Err(LockError::AlreadyLocked { .. })
    ));

    first.release("block").unwrap();
    assert!(!second.is_locked("block").unwrap());
    second.try_acquire("block").unwrap();
}

#[test]
fn test_file_lock_probes_do_not_conflict() {
    use fs2::FileExt;

    let dir = tempfile::tempdir().unwrap();
    let first = FileLock::new(dir.path()).unwrap();
    let second = FileLock::new(dir.path()).unwrap();
    first.try_acquire("block").unwrap();
    first.release("block").unwrap();

    // Another process in the middle of its own probe.
    let probe = std::fs::File::open(dir.path().join("block.lock")).unwrap();
    probe.try_lock_shared().unwrap();
    assert!(!second.is_locked("block").unwrap());
    FileExt::unlock(&probe).unwrap();

    // A probe leaves nothing behind.
    assert!(!second.is_locked("block").unwrap());
    first.try_acquire("block").unwrap();
    assert!(second.is_locked("block").unwrap());
}
