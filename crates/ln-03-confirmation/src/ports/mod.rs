//! Ports for the confirmation subsystem.

pub mod outbound;

pub use outbound::ConfirmationBroadcaster;
