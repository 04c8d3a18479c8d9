//! # Shared Crypto - Ledger Signing Protocol
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `signatures` | Ed25519 | Request, block and confirmation signatures |
//! | `hashing` | SHA3-256 | Request hashes, block identifiers, pending-block keys |
//! | `canonical` | compact JSON | Deterministic bytes fed to the two above |
//!
//! Everything here works on the hex-string newtypes from `shared-types`, so
//! callers never handle raw key material.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod canonical;
pub mod errors;
pub mod hashing;
pub mod signatures;

// Re-exports
pub use canonical::canonical_bytes;
pub use errors::CryptoError;
pub use hashing::{hash_bytes, hash_value};
pub use signatures::{derive_public_key, generate_key_pair, sign, sign_value, verify, verify_value};
