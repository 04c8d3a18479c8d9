//! Cross-crate flows over a simulated network.

pub mod network;

#[cfg(test)]
mod flows;
