//! Ports for peer communication.

pub mod outbound;

pub use outbound::NodeClient;
