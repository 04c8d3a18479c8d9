//! # Ledger Node Test Suite
//!
//! Flows that span several nodes, each with its own ledger, talking through
//! the in-process loopback client.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── network.rs   # Multi-node harness
//!     └── flows.rs     # Genesis, forwarding, confirmation, sync
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p ln-tests
//! ```

pub mod integration;
