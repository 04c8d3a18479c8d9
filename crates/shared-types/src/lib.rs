//! # Shared Types Crate
//!
//! This crate contains the identifiers and ledger entities exchanged between
//! the ledger subsystems and with peer nodes.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-subsystem types are defined here.
//! - **Opaque Identifiers**: Keys, hashes and signatures are validated
//!   lowercase hex strings, never raw bytes in the public model.
//! - **Field-Path Errors**: Structural failures are keyed by the path of the
//!   offending field so they can be returned to API clients verbatim.

pub mod entities;
pub mod errors;
pub mod ids;
pub mod pagination;

pub use entities::*;
pub use errors::*;
pub use ids::*;
pub use pagination::*;
