//! # Store Lock
//!
//! Presence of `lock:<name>` means held. Acquire is insert-if-absent and
//! release is delete-if-present, both under the store's write lock.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::domain::errors::LockError;
use crate::domain::keys;
use crate::ports::outbound::{AdvisoryLock, KeyValueStore};

/// Advisory lock over the `lock` collection of a keyed store.
pub struct StoreLock<S: KeyValueStore> {
    store: Arc<RwLock<S>>,
}

impl<S: KeyValueStore> StoreLock<S> {
    pub fn new(store: Arc<RwLock<S>>) -> Self {
        Self { store }
    }
}

impl<S: KeyValueStore> AdvisoryLock for StoreLock<S> {
    fn try_acquire(&self, name: &str) -> Result<(), LockError> {
        let inserted = self
            .store
            .write()
            .insert_if_absent(&keys::lock(name), name.as_bytes())?;
        if inserted {
            Ok(())
        } else {
            Err(LockError::AlreadyLocked {
                name: name.to_owned(),
            })
        }
    }

    fn release(&self, name: &str) -> Result<(), LockError> {
        let deleted = self.store.write().delete_if_present(&keys::lock(name))?;
        if deleted {
            Ok(())
        } else {
            Err(LockError::NotLocked {
                name: name.to_owned(),
            })
        }
    }

    fn is_locked(&self, name: &str) -> Result<bool, LockError> {
        Ok(self.store.read().exists(&keys::lock(name))?)
    }
}
