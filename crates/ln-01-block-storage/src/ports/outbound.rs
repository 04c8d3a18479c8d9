//! # Outbound Ports (Driven Ports)
//!
//! Interfaces the ledger requires from its host: a keyed store and an
//! advisory lock primitive.

use crate::domain::errors::{KVStoreError, LockError};

/// Result of a prefix scan, ordered by key.
pub type ScanResult = Vec<(Vec<u8>, Vec<u8>)>;

/// Abstract interface for key-value database operations.
///
/// Adapters: `InMemoryKVStore`, `FileBackedKVStore`.
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    /// Put a single key-value pair.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    /// Delete a key. Deleting a missing key is not an error.
    fn delete(&mut self, key: &[u8]) -> Result<(), KVStoreError>;

    /// Execute an atomic batch write.
    ///
    /// Either all operations in the batch are applied, or none are.
    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError>;

    /// Check if a key exists.
    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError>;

    /// All entries whose key starts with `prefix`, in key order.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError>;

    /// Insert only when the key is absent. Returns whether it was inserted.
    ///
    /// `&mut self` makes the check and the write one step for any caller
    /// holding the store behind a lock.
    fn insert_if_absent(&mut self, key: &[u8], value: &[u8]) -> Result<bool, KVStoreError> {
        if self.exists(key)? {
            return Ok(false);
        }
        self.put(key, value)?;
        Ok(true)
    }

    /// Delete only when the key is present. Returns whether it was deleted.
    fn delete_if_present(&mut self, key: &[u8]) -> Result<bool, KVStoreError> {
        if !self.exists(key)? {
            return Ok(false);
        }
        self.delete(key)?;
        Ok(true)
    }
}

/// Batch operation for atomic writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    /// Put a key-value pair.
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Delete a key.
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    /// Create a Put operation.
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a Delete operation.
    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }
}

/// Test-and-set primitive over named locks.
///
/// `try_acquire` never blocks. Adapters: `StoreLock` (a `lock` collection in
/// a keyed store) and `FileLock` (`fs2` exclusive locks, shared between
/// processes on one host).
pub trait AdvisoryLock: Send + Sync {
    /// Take the lock or fail with `LockError::AlreadyLocked`.
    fn try_acquire(&self, name: &str) -> Result<(), LockError>;

    /// Give the lock back or fail with `LockError::NotLocked`.
    fn release(&self, name: &str) -> Result<(), LockError>;

    /// Whether anyone currently holds the lock.
    fn is_locked(&self, name: &str) -> Result<bool, LockError>;
}
