//! # Advisory Lock Adapters
//!
//! ## Modules
//!
//! - `store`: lock entries in the keyed store's `lock` collection
//! - `flock`: `<name>.lock` files under a directory, locked with fs2

mod flock;
mod store;
#[cfg(test)]
mod tests;

pub use flock::FileLock;
pub use store::StoreLock;
