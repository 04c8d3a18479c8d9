//! Domain layer: confirmation entities, configuration, errors.

pub mod config;
pub mod entities;
pub mod error;

pub use config::ConfirmationConfig;
pub use entities::{BlockConfirmation, ConfirmationMessage, PendingBlock};
pub use error::ConfirmationError;
