//! Broadcaster adapters for single-node setups and tests.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::BlockConfirmation;
use crate::ports::ConfirmationBroadcaster;

/// Drops every confirmation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBroadcaster;

#[async_trait]
impl ConfirmationBroadcaster for NoopBroadcaster {
    async fn broadcast_confirmation(&self, _confirmation: &BlockConfirmation) -> usize {
        0
    }
}

/// Keeps every broadcast confirmation in memory.
#[derive(Debug, Default)]
pub struct RecordingBroadcaster {
    sent: Mutex<Vec<BlockConfirmation>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<BlockConfirmation> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl ConfirmationBroadcaster for RecordingBroadcaster {
    async fn broadcast_confirmation(&self, confirmation: &BlockConfirmation) -> usize {
        self.sent.lock().push(confirmation.clone());
        1
    }
}
