//! # Typed Collection Access
//!
//! JSON values over raw store bytes. Decoding failures surface as
//! `KVStoreError::CorruptionError`.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::errors::KVStoreError;
use crate::ports::outbound::{BatchOperation, KeyValueStore};

/// Read and decode one value.
pub fn get_json<S, T>(store: &S, key: &[u8]) -> Result<Option<T>, KVStoreError>
where
    S: KeyValueStore + ?Sized,
    T: DeserializeOwned,
{
    store
        .get(key)?
        .map(|bytes| serde_json::from_slice(&bytes).map_err(KVStoreError::corruption))
        .transpose()
}

/// Encode a value as a batch `Put`.
pub fn put_json<T: Serialize + ?Sized>(
    key: Vec<u8>,
    value: &T,
) -> Result<BatchOperation, KVStoreError> {
    let bytes = serde_json::to_vec(value).map_err(KVStoreError::corruption)?;
    Ok(BatchOperation::put(key, bytes))
}

/// Decode every value under `prefix`, in key order.
pub fn scan_json<S, T>(store: &S, prefix: &[u8]) -> Result<Vec<(Vec<u8>, T)>, KVStoreError>
where
    S: KeyValueStore + ?Sized,
    T: DeserializeOwned,
{
    store
        .prefix_scan(prefix)?
        .into_iter()
        .map(|(key, bytes)| {
            let value = serde_json::from_slice(&bytes).map_err(KVStoreError::corruption)?;
            Ok((key, value))
        })
        .collect()
}
