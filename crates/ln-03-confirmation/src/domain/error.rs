//! Error types for the confirmation subsystem.

use ln_01_block_storage::KVStoreError;
use ln_02_ledger::LedgerError;
use shared_crypto::CryptoError;
use shared_types::{AccountNumber, Hash, ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfirmationError {
    #[error("Invalid data: {0}")]
    Structural(#[from] ValidationError),

    #[error("Invalid confirmation signature")]
    InvalidSignature,

    #[error("{0} is not authorized to confirm blocks")]
    UnauthorizedSigner(AccountNumber),

    #[error("Fork at block {number}: confirmed {existing}, received {conflicting}")]
    Fork {
        number: u64,
        existing: Hash,
        conflicting: Hash,
    },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Storage error: {0}")]
    Storage(#[from] KVStoreError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}
