//! Services built on top of the ports.

pub mod collections;
pub mod lock;
