//! Error types for the ledger subsystem.

use ln_01_block_storage::{KVStoreError, LockError};
use shared_crypto::CryptoError;
use shared_types::{AccountLock, AccountNumber, Type, ValidationError};
use thiserror::Error;

/// Block ordering violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    #[error("expected block number {expected}, got {actual}")]
    OutOfOrder { expected: u64, actual: u64 },

    #[error("block {number} does not chain onto the current head")]
    IdentifierMismatch { number: u64 },

    #[error("ledger has no genesis block")]
    MissingGenesis,

    #[error("ledger already has a genesis block")]
    GenesisExists,
}

/// Ledger error types.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Invalid data: {0}")]
    Structural(#[from] ValidationError),

    #[error("Invalid {subject} signature")]
    Signature { subject: &'static str },

    #[error("Stale account lock for {account}: ledger has {expected}, request has {actual}")]
    StaleLock {
        account: AccountNumber,
        expected: AccountLock,
        actual: AccountLock,
    },

    #[error("Sequence violation: {0}")]
    Sequence(#[from] SequenceError),

    #[error("Block {number} must be signed by {expected}, got {actual}")]
    UnauthorizedSigner {
        number: u64,
        expected: String,
        actual: AccountNumber,
    },

    #[error("Block lock contention: {0}")]
    LockContention(LockError),

    #[error("Block lock integrity violation: {0}")]
    LockIntegrity(LockError),

    #[error("Genesis request routed through the generic block construction path")]
    GenesisViaGenericPath,

    #[error("Genesis block construction requires a genesis request, got {0}")]
    NotAGenesisRequest(Type),

    #[error("Storage error: {0}")]
    Storage(#[from] KVStoreError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl From<LockError> for LedgerError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::AlreadyLocked { .. } => LedgerError::LockContention(err),
            LockError::NotLocked { .. } => LedgerError::LockIntegrity(err),
            LockError::Backend { message } => {
                LedgerError::Storage(KVStoreError::IOError { message })
            }
        }
    }
}

impl LedgerError {
    /// True when the ledger or its caller is in a bad state, as opposed to
    /// someone having sent bad input.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            LedgerError::Sequence(_)
                | LedgerError::LockIntegrity(_)
                | LedgerError::GenesisViaGenericPath
                | LedgerError::NotAGenesisRequest(_)
                | LedgerError::Storage(_)
        )
    }

    /// Field-path errors for an API client response.
    pub fn to_validation_error(&self) -> ValidationError {
        match self {
            LedgerError::Structural(err) => err.clone(),
            LedgerError::Signature { subject } => {
                ValidationError::field("signature", format!("Invalid {subject} signature."))
            }
            LedgerError::StaleLock { .. } => {
                ValidationError::field("message.account_lock", "Invalid value.")
            }
            other => ValidationError::non_field(other.to_string()),
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
