//! Port traits.

pub mod inbound;

pub use inbound::LedgerReader;
