//! Confirmation protocol configuration.

use shared_types::AccountNumber;

/// Quorum settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationConfig {
    /// Distinct signers needed to accept a block.
    pub quorum: usize,
    /// Nodes allowed to confirm. Empty means any node in the registry.
    pub confirmation_validators: Vec<AccountNumber>,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            quorum: 1,
            confirmation_validators: Vec::new(),
        }
    }
}

impl ConfirmationConfig {
    pub fn with_quorum(quorum: usize) -> Self {
        Self {
            quorum,
            ..Default::default()
        }
    }
}
