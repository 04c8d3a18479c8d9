//! # Domain Errors
//!
//! Error types for the storage and locking layer.

use thiserror::Error;

/// Key-value store adapter errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KVStoreError {
    /// I/O error during read/write.
    #[error("KV store I/O error: {message}")]
    IOError { message: String },

    /// Stored bytes could not be decoded.
    #[error("KV store corruption: {message}")]
    CorruptionError { message: String },
}

impl KVStoreError {
    pub fn io(err: impl std::fmt::Display) -> Self {
        KVStoreError::IOError {
            message: err.to_string(),
        }
    }

    pub fn corruption(err: impl std::fmt::Display) -> Self {
        KVStoreError::CorruptionError {
            message: err.to_string(),
        }
    }
}

/// Advisory lock errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// Someone else holds the lock. Retrying is the caller's decision.
    #[error("Lock '{name}' is already held")]
    AlreadyLocked { name: String },

    /// Released or expected a lock that is not held. Indicates an ordering bug.
    #[error("Lock '{name}' is not held")]
    NotLocked { name: String },

    /// The lock backend itself failed.
    #[error("Lock backend failure: {message}")]
    Backend { message: String },
}

impl From<KVStoreError> for LockError {
    fn from(err: KVStoreError) -> Self {
        LockError::Backend {
            message: err.to_string(),
        }
    }
}
