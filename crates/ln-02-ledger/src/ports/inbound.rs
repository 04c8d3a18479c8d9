//! Driving ports (Inbound API)
//!
//! Read side of the ledger. Validation and block construction only need
//! these queries, so they take `&dyn LedgerReader` instead of a concrete
//! service.

use shared_types::{AccountLock, AccountNumber, BlockIdentifier, Node};

use crate::domain::LedgerResult;

pub trait LedgerReader: Send + Sync {
    /// Current lock of `account`; the account number itself when unknown.
    fn current_lock(&self, account: &AccountNumber) -> LedgerResult<AccountLock>;

    /// Current balance of `account`; 0 when unknown.
    fn current_balance(&self, account: &AccountNumber) -> LedgerResult<u64>;

    /// Number the next appended block must carry.
    fn next_block_number(&self) -> LedgerResult<u64>;

    /// Identifier the next block must carry. `None` on an empty ledger.
    fn next_block_identifier(&self) -> LedgerResult<Option<BlockIdentifier>>;

    fn node_by_identifier(&self, identifier: &AccountNumber) -> LedgerResult<Option<Node>>;

    /// Node scheduled for block `number`: the schedule entry with the
    /// greatest key not above `number`.
    fn validator_for(&self, number: u64) -> LedgerResult<Option<AccountNumber>>;

    /// Node scheduled to produce the next block.
    fn primary_validator(&self) -> LedgerResult<Option<Node>> {
        let number = self.next_block_number()?;
        match self.validator_for(number)? {
            Some(identifier) => self.node_by_identifier(&identifier),
            None => Ok(None),
        }
    }
}
