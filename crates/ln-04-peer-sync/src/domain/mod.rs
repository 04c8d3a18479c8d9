//! Domain layer: errors, outgoing messages, reports.

pub mod error;
pub mod message;
pub mod report;

pub use error::PeerSyncError;
pub use message::Outgoing;
pub use report::{PropagationReport, SyncReport};
