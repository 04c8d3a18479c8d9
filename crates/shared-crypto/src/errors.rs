//! Crypto error types.

use shared_types::HexStringError;
use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Signing key is not a valid hex seed
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(HexStringError),

    /// Value could not be encoded to canonical bytes
    #[error("Canonical encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}
