//! Error types for peer communication.

use ln_02_ledger::LedgerError;
use shared_types::AccountNumber;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PeerSyncError {
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("Invalid response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("No reachable address for node {node}")]
    Unreachable { node: AccountNumber },

    #[error("Peer sent block {actual}, expected {expected}")]
    UnexpectedBlock { expected: u64, actual: u64 },

    #[error("Sync with {node} stopped at block {number}: {source}")]
    Rejected {
        node: AccountNumber,
        number: u64,
        source: Box<PeerSyncError>,
    },

    #[error("No peer could be synchronized with")]
    NoPeerSynced,

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl PeerSyncError {
    /// Failures talking to a peer, as opposed to data the ledger refused.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::Status { .. }
                | Self::Decode { .. }
                | Self::Unreachable { .. }
                | Self::NoPeerSynced
        )
    }
}
