//! # Pending Blocks and Confirmations

use ln_02_ledger::{Block, LedgerResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_crypto::{derive_public_key, sign_value, verify_value, CryptoError};
use shared_types::{AccountNumber, Hash, Signature, SigningKey, ValidationError};

/// A block received from the primary validator, awaiting quorum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingBlock {
    pub number: u64,
    pub hash: Hash,
    pub block: Block,
}

impl PendingBlock {
    pub fn new(block: Block) -> LedgerResult<Self> {
        Ok(Self {
            number: block.number(),
            hash: block.make_hash()?,
            block,
        })
    }
}

/// The signed part of a confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationMessage {
    pub number: u64,
    pub hash: Hash,
}

/// One confirmation validator's vote for a `(number, hash)` candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlockConfirmation {
    pub number: u64,
    pub hash: Hash,
    pub signer: AccountNumber,
    pub signature: Signature,
}

impl BlockConfirmation {
    pub fn create(number: u64, hash: Hash, signing_key: &SigningKey) -> Result<Self, CryptoError> {
        let message = ConfirmationMessage {
            number,
            hash: hash.clone(),
        };
        Ok(Self {
            number,
            hash,
            signer: derive_public_key(signing_key)?,
            signature: sign_value(&message, signing_key)?,
        })
    }

    pub fn message(&self) -> ConfirmationMessage {
        ConfirmationMessage {
            number: self.number,
            hash: self.hash.clone(),
        }
    }

    pub fn is_signature_valid(&self) -> bool {
        verify_value(&self.signer, &self.message(), &self.signature)
    }

    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        serde_json::from_value(value.clone())
            .map_err(|err| ValidationError::non_field(err.to_string()))
    }
}
