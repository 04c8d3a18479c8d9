//! # Node Runtime Library
//!
//! Assembles the ledger crates into a node. The `node-runtime` binary is a
//! thin command line over this library.
//!
//! ## Modular Structure
//!
//! - `container/` - configuration and the [`LedgerNode`] that owns all services
//! - `api/` - request handlers for the node's REST surface
//! - `adapters/` - in-process node client
//! - `genesis/` - chain initialization
//! - `telemetry` - log output

pub mod adapters;
pub mod api;
pub mod container;
pub mod genesis;
pub mod telemetry;

pub use container::{ConfigError, LedgerNode, NodeConfig};
