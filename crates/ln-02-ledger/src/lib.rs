//! # Ledger (ln-02)
//!
//! Request and block variants plus the ledger state engine.
//!
//! ## Data Flow
//!
//! ```text
//! SignedChangeRequest ──validate──→ BlockMessage::create_from_signed_change_request
//!                                          │ (number, identifier, update, timestamp)
//!                                          ↓
//!                                   Block::create (validator signs)
//!                                          ↓
//!                         LedgerService::append (under the "block" lock)
//! ```
//!
//! ## Invariants
//!
//! | Invariant | Enforced by |
//! |-----------|-------------|
//! | Block numbers are gapless from 0 | `append` checks `next_block_number` under the store write guard |
//! | Block 0 is genesis with no identifier | `Validatable for BlockMessage` |
//! | Block N > 0 chains to N-1 | identifier = hash of the previous block message |
//! | Requests are not replayed | account lock must equal the signer's current lock |
//! | One writer at a time | `append` asserts the block lock is held |
//! | A block's writes are all-or-nothing | one `atomic_batch_write` per block |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - variants, update computation, validation, errors
//! - `ports/` - `LedgerReader`
//! - `service/` - `LedgerService` over a `KeyValueStore`

pub mod domain;
pub mod ports;
pub mod service;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use domain::{
    compute_genesis_update, compute_update, AlphaAccount, Block, BlockMessage,
    BlockMessageUpdate, LedgerError, LedgerResult, RequestPayload, SequenceError,
    SignedChangeRequest, SignedChangeRequestMessage, Validatable,
};
pub use ports::LedgerReader;
pub use service::{BlockRef, LedgerService};
