//! # Blocks
//!
//! `BlockMessage` carries the delta a request produces plus its position in
//! the chain; `Block` is that message signed by the producing validator.
//!
//! Two construction paths exist. The generic path builds block N > 0 from any
//! non-genesis request. The genesis path builds block 0 from the account root
//! file and the primary validator node. Feeding a genesis request to the
//! generic path is a programming error, reported as
//! `LedgerError::GenesisViaGenericPath`.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_crypto::{derive_public_key, hash_value, sign_value, verify_value};
use shared_types::{
    AccountNumber, AccountState, BlockIdentifier, Hash, Node, Schedule, Signature, SigningKey,
    Type, ValidationError,
};

use super::error::SequenceError;
use super::request::{RequestPayload, SignedChangeRequest};
use super::validation::Validatable;
use super::{LedgerError, LedgerResult};
use crate::ports::LedgerReader;

/// Delta applied by one block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMessageUpdate {
    /// Changed accounts only. Each entry carries just the fields it writes.
    pub accounts: BTreeMap<AccountNumber, AccountState>,
    /// Schedule entries to merge. Absent means no schedule change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,
}

/// Type-specific update for a non-genesis request.
pub fn compute_update(request: &SignedChangeRequest) -> LedgerResult<BlockMessageUpdate> {
    match &request.message.payload {
        RequestPayload::Genesis { .. } => Err(LedgerError::GenesisViaGenericPath),
        RequestPayload::NodeDeclaration { node } => {
            let state = AccountState {
                balance: None,
                account_lock: Some(request.make_hash()?.into()),
                node: Some(Node::from_declaration(request.signer.clone(), node.clone())),
            };
            let mut accounts = BTreeMap::new();
            accounts.insert(request.signer.clone(), state);
            Ok(BlockMessageUpdate {
                accounts,
                schedule: None,
            })
        }
    }
}

/// Update of block 0: seeds every root-file account, registers the primary
/// validator node and schedules it from block 0.
pub fn compute_genesis_update(
    request: &SignedChangeRequest,
    primary_validator: &Node,
) -> LedgerResult<BlockMessageUpdate> {
    let RequestPayload::Genesis { accounts: alpha } = &request.message.payload else {
        return Err(LedgerError::NotAGenesisRequest(request.request_type()));
    };

    let mut accounts: BTreeMap<AccountNumber, AccountState> = alpha
        .iter()
        .map(|(number, account)| {
            let state = AccountState {
                balance: Some(account.balance),
                account_lock: Some(account.balance_lock.clone()),
                node: None,
            };
            (number.clone(), state)
        })
        .collect();
    accounts
        .entry(primary_validator.identifier.clone())
        .or_default()
        .node = Some(primary_validator.clone());

    let mut schedule = Schedule::new();
    schedule.insert(0, primary_validator.identifier.clone());

    Ok(BlockMessageUpdate {
        accounts,
        schedule: Some(schedule),
    })
}

/// Current UTC time, no offset, microsecond precision.
pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(6)
}

/// Unsigned block body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMessage {
    #[serde(rename = "type")]
    pub block_type: Type,
    pub number: u64,
    /// Hash of the previous block message. `None` only on block 0.
    pub identifier: Option<BlockIdentifier>,
    pub timestamp: NaiveDateTime,
    pub update: BlockMessageUpdate,
    pub request: SignedChangeRequest,
}

impl BlockMessage {
    /// Generic path: next block for a non-genesis request.
    pub fn create_from_signed_change_request(
        request: &SignedChangeRequest,
        ledger: &dyn LedgerReader,
    ) -> LedgerResult<Self> {
        if request.is_genesis() {
            return Err(LedgerError::GenesisViaGenericPath);
        }

        let number = ledger.next_block_number()?;
        if number == 0 {
            return Err(SequenceError::MissingGenesis.into());
        }
        let identifier = ledger
            .next_block_identifier()?
            .ok_or(SequenceError::MissingGenesis)?;

        Ok(Self {
            block_type: request.request_type(),
            number,
            identifier: Some(identifier),
            timestamp: now(),
            update: compute_update(request)?,
            request: request.clone(),
        })
    }

    /// Genesis path: block 0.
    pub fn create_genesis(
        request: &SignedChangeRequest,
        primary_validator: &Node,
    ) -> LedgerResult<Self> {
        Ok(Self {
            block_type: Type::Genesis,
            number: 0,
            identifier: None,
            timestamp: now(),
            update: compute_genesis_update(request, primary_validator)?,
            request: request.clone(),
        })
    }

    pub fn is_genesis(&self) -> bool {
        self.block_type == Type::Genesis
    }

    /// Identifier of the block following this one.
    pub fn make_hash(&self) -> LedgerResult<Hash> {
        Ok(hash_value(self)?)
    }

    /// Update this message should carry, recomputed from its request.
    pub fn expected_update(&self) -> LedgerResult<BlockMessageUpdate> {
        if !self.is_genesis() {
            return compute_update(&self.request);
        }
        // The genesis primary validator is the node scheduled for block 0.
        let primary_validator = self
            .update
            .schedule
            .as_ref()
            .and_then(|schedule| schedule.get(&0))
            .and_then(|identifier| self.update.accounts.get(identifier))
            .and_then(|state| state.node.as_ref())
            .ok_or_else(|| {
                ValidationError::field("update.schedule", "Primary validator node is missing.")
            })?;
        compute_genesis_update(&self.request, primary_validator)
    }
}

/// A block message signed by the validator that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub signer: AccountNumber,
    pub signature: Signature,
    pub message: BlockMessage,
}

impl Block {
    pub fn create(message: BlockMessage, signing_key: &SigningKey) -> LedgerResult<Self> {
        Ok(Self {
            signer: derive_public_key(signing_key)?,
            signature: sign_value(&message, signing_key)?,
            message,
        })
    }

    pub fn number(&self) -> u64 {
        self.message.number
    }

    /// Hash of the whole signed block. Keys pending blocks and confirmations.
    pub fn make_hash(&self) -> LedgerResult<Hash> {
        Ok(hash_value(self)?)
    }

    pub fn is_signature_valid(&self) -> bool {
        verify_value(&self.signer, &self.message, &self.signature)
    }

    /// Decode a block envelope. Shape errors are reported without a field
    /// path; semantic errors come from structural validation.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let block: Block = serde_json::from_value(value.clone())
            .map_err(|err| ValidationError::non_field(err.to_string()))?;
        block.validate_structure()?;
        Ok(block)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ValidationError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|err| ValidationError::non_field(err.to_string()))?;
        Self::from_value(&value)
    }

    /// Validation used before appending: everything a receiving node can
    /// check against its own ledger.
    pub fn validate(&self, ledger: &dyn LedgerReader) -> LedgerResult<()> {
        self.validate_structure()?;

        if !self.is_signature_valid() {
            return Err(LedgerError::Signature { subject: "block" });
        }

        let expected_number = ledger.next_block_number()?;
        if self.number() != expected_number {
            return Err(SequenceError::OutOfOrder {
                expected: expected_number,
                actual: self.number(),
            }
            .into());
        }

        if self.message.identifier != ledger.next_block_identifier()? {
            return Err(SequenceError::IdentifierMismatch {
                number: self.number(),
            }
            .into());
        }

        self.message.request.validate(ledger)?;

        if self.message.update != self.message.expected_update()? {
            return Err(ValidationError::field(
                "message.update",
                "Does not match the update computed from the request.",
            )
            .into());
        }

        let expected_signer = if self.message.is_genesis() {
            self.message
                .update
                .schedule
                .as_ref()
                .and_then(|schedule| schedule.get(&0))
                .cloned()
        } else {
            ledger.validator_for(self.number())?
        };
        if expected_signer.as_ref() != Some(&self.signer) {
            return Err(LedgerError::UnauthorizedSigner {
                number: self.number(),
                expected: expected_signer
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "<unscheduled>".to_owned()),
                actual: self.signer.clone(),
            });
        }

        Ok(())
    }
}
