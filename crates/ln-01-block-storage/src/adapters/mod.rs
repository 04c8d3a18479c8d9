//! Adapters implementing the outbound ports.

pub mod lock;
pub mod storage;
