//! # Outbound Ports
//!
//! What the confirmation worker needs from the network.

use async_trait::async_trait;

use crate::domain::BlockConfirmation;

/// Delivers a local confirmation to the other confirmation validators.
///
/// Best effort: one unreachable peer never prevents delivery to the others.
#[async_trait]
pub trait ConfirmationBroadcaster: Send + Sync {
    /// Returns the number of peers that accepted the confirmation.
    async fn broadcast_confirmation(&self, confirmation: &BlockConfirmation) -> usize;
}
