//! # Confirmation (ln-03)
//!
//! Quorum protocol run by confirmation validators.
//!
//! ## Flow
//!
//! ```text
//! Primary ──Block──→ stage_block ──(number, hash)──→ ConfirmationWorker
//!                        │ idempotent                     │ validate against ledger
//!                        ↓                                │ sign {number, hash}
//!                  pending_block                          ↓
//!                                            store + broadcast BlockConfirmation
//!                                                         │
//! Peers ──BlockConfirmation──→ receive_confirmation ──────┤
//!                                                         ↓
//!                         try_accept: quorum of distinct authorized signers
//!                                     for the same (number, hash)
//!                                                         ↓
//!                                      LedgerService::append_locked (once)
//! ```
//!
//! Two confirmations for the same number with different hashes are a fork.
//! Both are stored, each hash keeps its own tally and the first one to reach
//! quorum is appended. A received confirmation that conflicts with an earlier
//! one and does not complete a quorum is reported as `ConfirmationError::Fork`.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{NoopBroadcaster, RecordingBroadcaster};
pub use domain::{
    BlockConfirmation, ConfirmationConfig, ConfirmationError, ConfirmationMessage, PendingBlock,
};
pub use ports::ConfirmationBroadcaster;
pub use service::{ConfirmationService, ConfirmationWorker, ReceiveOutcome, StageOutcome};
