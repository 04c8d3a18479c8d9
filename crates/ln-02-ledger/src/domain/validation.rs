//! # Validation Capability
//!
//! Every request, message and block variant implements [`Validatable`].
//! Structural rules need no ledger state; business rules may read it.

use shared_types::{NodeDeclaration, ValidationError};

use super::block::{Block, BlockMessage};
use super::error::SequenceError;
use super::request::{RequestPayload, SignedChangeRequest, SignedChangeRequestMessage};
use super::LedgerResult;
use crate::ports::LedgerReader;

pub trait Validatable {
    /// Shape and field constraints. Paths are relative to `self`.
    fn validate_structure(&self) -> Result<(), ValidationError>;

    /// Rules that depend on ledger state. No-op unless a variant needs one.
    fn validate_business(&self, _ledger: &dyn LedgerReader) -> LedgerResult<()> {
        Ok(())
    }
}

fn is_valid_address(address: &str) -> bool {
    let rest = address
        .strip_prefix("http://")
        .or_else(|| address.strip_prefix("https://"));
    match rest {
        Some(rest) => rest.len() > 1 && rest.ends_with('/') && !rest.starts_with('/'),
        None => false,
    }
}

impl Validatable for NodeDeclaration {
    fn validate_structure(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::default();
        if self.addresses.is_empty() {
            errors.push("addresses", "Ensure this field has at least 1 element.");
        }
        for (index, address) in self.addresses.iter().enumerate() {
            if !is_valid_address(address) {
                errors.push(
                    format!("addresses.{index}"),
                    "Must be an http(s) URL ending with '/'.",
                );
            }
            if self.addresses[..index].contains(address) {
                errors.push(format!("addresses.{index}"), "Duplicate address.");
            }
        }
        errors.into_result()
    }
}

impl Validatable for RequestPayload {
    fn validate_structure(&self) -> Result<(), ValidationError> {
        match self {
            RequestPayload::Genesis { accounts } => {
                if accounts.is_empty() {
                    return Err(ValidationError::field(
                        "accounts",
                        "Ensure this field has at least 1 element.",
                    ));
                }
                Ok(())
            }
            RequestPayload::NodeDeclaration { node } => {
                node.validate_structure().map_err(|err| err.nested("node"))
            }
        }
    }

    fn validate_business(&self, ledger: &dyn LedgerReader) -> LedgerResult<()> {
        match self {
            RequestPayload::Genesis { .. } => {
                if ledger.next_block_number()? != 0 {
                    return Err(SequenceError::GenesisExists.into());
                }
                Ok(())
            }
            RequestPayload::NodeDeclaration { .. } => Ok(()),
        }
    }
}

impl Validatable for SignedChangeRequestMessage {
    fn validate_structure(&self) -> Result<(), ValidationError> {
        self.payload.validate_structure()
    }

    fn validate_business(&self, ledger: &dyn LedgerReader) -> LedgerResult<()> {
        self.payload.validate_business(ledger)
    }
}

impl Validatable for SignedChangeRequest {
    fn validate_structure(&self) -> Result<(), ValidationError> {
        self.message
            .validate_structure()
            .map_err(|err| err.nested("message"))
    }

    fn validate_business(&self, ledger: &dyn LedgerReader) -> LedgerResult<()> {
        self.message.validate_business(ledger)
    }
}

impl Validatable for BlockMessage {
    fn validate_structure(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::default();

        if self.block_type != self.request.request_type() {
            errors.push("type", "Does not match the request type.");
        }
        match (self.is_genesis(), self.number == 0) {
            (true, false) => errors.push("number", "Genesis block must be number 0."),
            (false, true) => errors.push("number", "Block 0 must be a genesis block."),
            _ => {}
        }
        match (self.number == 0, self.identifier.is_some()) {
            (true, true) => errors.push("identifier", "Block 0 carries no identifier."),
            (false, false) => errors.push("identifier", "This field is required."),
            _ => {}
        }
        if let Err(err) = self.request.validate_structure() {
            errors.merge(err.nested("request"));
        }

        errors.into_result()
    }
}

impl Validatable for Block {
    fn validate_structure(&self) -> Result<(), ValidationError> {
        self.message
            .validate_structure()
            .map_err(|err| err.nested("message"))
    }
}
