//! # SHA3-256 Hashing
//!
//! Digests are returned as the hex `Hash` newtype.

use serde::Serialize;
use sha3::{Digest, Sha3_256};
use shared_types::Hash;

use crate::{canonical_bytes, CryptoError};

/// Hash raw bytes.
pub fn hash_bytes(data: &[u8]) -> Hash {
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&Sha3_256::digest(data));
    Hash::from_bytes(&digest)
}

/// Hash the canonical bytes of a value.
pub fn hash_value<T: Serialize + ?Sized>(value: &T) -> Result<Hash, CryptoError> {
    Ok(hash_bytes(&canonical_bytes(value)?))
}
