//! Messages a node pushes to its peers.

use ln_02_ledger::{Block, SignedChangeRequest};
use ln_03_confirmation::BlockConfirmation;

#[derive(Debug, Clone, Copy)]
pub enum Outgoing<'a> {
    /// Forwarded to the primary validator.
    Request(&'a SignedChangeRequest),
    /// Sent by the primary validator to the confirmation validators.
    Block(&'a Block),
    /// Exchanged between confirmation validators.
    Confirmation(&'a BlockConfirmation),
}

impl Outgoing<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Outgoing::Request(_) => "request",
            Outgoing::Block(_) => "block",
            Outgoing::Confirmation(_) => "confirmation",
        }
    }
}
