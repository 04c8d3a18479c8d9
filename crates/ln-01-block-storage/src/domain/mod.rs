//! Domain layer: key schema and errors.

pub mod errors;
pub mod keys;
