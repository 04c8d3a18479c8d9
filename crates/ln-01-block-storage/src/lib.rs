//! # Block Storage (ln-01)
//!
//! Persistence layer for the ledger node. Everything the ledger keeps lives
//! in one abstract keyed store, split into named collections by key prefix.
//!
//! ## Collections
//!
//! | Collection | Key | Value |
//! |------------|-----|-------|
//! | `block` | block number | signed block JSON |
//! | `account` | account number | account state JSON |
//! | `node` | node identifier | node JSON |
//! | `schedule` | block number | node identifier |
//! | `pending_block` | `(number, hash)` | staged block JSON |
//! | `block_confirmation` | `(number, hash, signer)` | confirmation JSON |
//! | `lock` | lock name | presence means held |
//! | `meta` | fixed names | chain head bookkeeping |
//!
//! Block numbers inside keys are zero-padded so a prefix scan returns them in
//! numeric order.
//!
//! ## Advisory Locks
//!
//! Appending a block is single-writer. [`NamedLock`] wraps an
//! [`AdvisoryLock`] backend and hands out a [`LockGuard`]; acquisition never
//! waits, contention is reported to the caller.
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - key schema and error types
//! - `ports/` - `KeyValueStore` and `AdvisoryLock` traits
//! - `adapters/` - in-memory and file-backed stores, store and file locks
//! - `service/` - typed JSON access and the named lock

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::lock::{FileLock, StoreLock};
pub use adapters::storage::{FileBackedKVStore, InMemoryKVStore};
pub use domain::errors::{KVStoreError, LockError};
pub use domain::keys::{self as keys, Collection};
pub use ports::outbound::{AdvisoryLock, BatchOperation, KeyValueStore, ScanResult};
pub use service::collections::{get_json, put_json, scan_json};
pub use service::lock::{LockGuard, NamedLock, BLOCK_LOCK};
