use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use super::{apply_batch, scan};
use crate::domain::errors::KVStoreError;
use crate::ports::outbound::{BatchOperation, KeyValueStore, ScanResult};

/// File-backed key-value store.
///
/// Keeps the whole map in memory and rewrites one data file on every write
/// (temp file + rename). Suitable for development and small ledgers.
pub struct FileBackedKVStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
    path: PathBuf,
}

impl FileBackedKVStore {
    /// Open the store at `path`, loading existing contents.
    ///
    /// A missing file starts an empty store; a truncated or corrupt file is
    /// an error.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, KVStoreError> {
        let path = path.as_ref().to_path_buf();

        let data = if path.exists() {
            let data = Self::load_from_file(&path)?;
            tracing::info!(
                "[ln-01] Loaded {} keys from {}",
                data.len(),
                path.display()
            );
            data
        } else {
            tracing::info!("[ln-01] No existing storage file at {}", path.display());
            BTreeMap::new()
        };

        Ok(Self { data, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_file(path: &Path) -> Result<BTreeMap<Vec<u8>, Vec<u8>>, KVStoreError> {
        let mut file = std::fs::File::open(path).map_err(KVStoreError::io)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(KVStoreError::io)?;

        // Format: [key_len:u32][key][value_len:u32][value]...
        let mut data = BTreeMap::new();
        let mut cursor = 0;
        while cursor < bytes.len() {
            let key = Self::read_chunk(&bytes, &mut cursor)?;
            let value = Self::read_chunk(&bytes, &mut cursor)?;
            data.insert(key, value);
        }
        Ok(data)
    }

    fn read_chunk(bytes: &[u8], cursor: &mut usize) -> Result<Vec<u8>, KVStoreError> {
        let truncated = || KVStoreError::corruption("truncated storage file");

        let header = bytes.get(*cursor..*cursor + 4).ok_or_else(truncated)?;
        let mut len = [0u8; 4];
        len.copy_from_slice(header);
        let len = u32::from_le_bytes(len) as usize;
        *cursor += 4;

        let chunk = bytes.get(*cursor..*cursor + len).ok_or_else(truncated)?;
        *cursor += len;
        Ok(chunk.to_vec())
    }

    fn save_to_file(&self, data: &BTreeMap<Vec<u8>, Vec<u8>>) -> Result<(), KVStoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(KVStoreError::io)?;
        }

        let mut bytes = Vec::new();
        for (key, value) in data {
            bytes.extend_from_slice(&(key.len() as u32).to_le_bytes());
            bytes.extend_from_slice(key);
            bytes.extend_from_slice(&(value.len() as u32).to_le_bytes());
            bytes.extend_from_slice(value);
        }

        // Write atomically via temp file
        let temp_path = self.path.with_extension("tmp");
        let mut file = std::fs::File::create(&temp_path).map_err(KVStoreError::io)?;
        file.write_all(&bytes).map_err(KVStoreError::io)?;
        file.sync_all().map_err(KVStoreError::io)?;
        std::fs::rename(&temp_path, &self.path).map_err(KVStoreError::io)?;
        Ok(())
    }

    /// Apply `operations` to a copy, persist it, then swap it in.
    fn commit(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        let mut next = self.data.clone();
        apply_batch(&mut next, operations);
        self.save_to_file(&next)?;
        self.data = next;
        Ok(())
    }
}

impl KeyValueStore for FileBackedKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.commit(vec![BatchOperation::put(key, value)])
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), KVStoreError> {
        self.commit(vec![BatchOperation::delete(key)])
    }

    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        self.commit(operations)
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.data.contains_key(key))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError> {
        Ok(scan(&self.data, prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reopen_sees_committed_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        let mut store = FileBackedKVStore::open(&path).unwrap();
        store
            .atomic_batch_write(vec![
                BatchOperation::put(b"block:1".to_vec(), b"{}".to_vec()),
                BatchOperation::put(b"account:a".to_vec(), b"{}".to_vec()),
            ])
            .unwrap();
        store.delete(b"account:a").unwrap();
        drop(store);

        let reopened = FileBackedKVStore::open(&path).unwrap();
        assert_eq!(reopened.get(b"block:1").unwrap(), Some(b"{}".to_vec()));
        assert!(!reopened.exists(b"account:a").unwrap());
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBackedKVStore::open(dir.path().join("absent.db")).unwrap();
        assert!(store.prefix_scan(b"").unwrap().is_empty());
    }

    #[test]
    fn test_truncated_file_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.db");
        std::fs::write(&path, [10, 0, 0, 0, b'a']).unwrap();

        let result = FileBackedKVStore::open(&path);
        assert!(matches!(result, Err(KVStoreError::CorruptionError { .. })));
    }
}
