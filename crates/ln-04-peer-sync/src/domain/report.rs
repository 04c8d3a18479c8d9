//! Outcomes of propagation and synchronization runs.

use shared_types::AccountNumber;

use super::PeerSyncError;

/// Per-node outcome of a broadcast.
#[derive(Debug, Default)]
pub struct PropagationReport {
    /// Nodes that accepted the message, with the address that worked.
    pub delivered: Vec<(AccountNumber, String)>,
    pub failed: Vec<(AccountNumber, PeerSyncError)>,
}

impl PropagationReport {
    pub fn delivered_count(&self) -> usize {
        self.delivered.len()
    }
}

/// Outcome of replaying one peer's chain.
#[derive(Debug)]
pub struct SyncReport {
    pub address: String,
    /// Blocks appended during this run.
    pub applied: u64,
    /// Local chain head after the run.
    pub next_block_number: u64,
    /// What stopped the run early, if anything.
    pub error: Option<PeerSyncError>,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}
