//! # Adapters
//!
//! Node clients that reach peers without a network: the loopback client
//! dispatches straight into registered [`ApiHandler`](crate::api::ApiHandler)s.

pub mod loopback;

pub use loopback::LoopbackNodeClient;
