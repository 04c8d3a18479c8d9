//! # Canonical Bytes
//!
//! Compact `serde_json` encoding. Struct fields are written in declaration
//! order and every map in the ledger model is a `BTreeMap`, so two equal
//! values always produce the same bytes, across processes and across
//! parse/re-serialize round trips.

use serde::Serialize;

use crate::CryptoError;

/// Deterministic encoding used for hashing and signing.
pub fn canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CryptoError> {
    Ok(serde_json::to_vec(value)?)
}
