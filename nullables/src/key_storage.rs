//! Nullable key storage: key files kept in memory.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use kin_wallet_core::{KeyFile, KeyStorage, KinError};

/// In-memory [`KeyStorage`]. Entries vanish with the value.
#[derive(Default)]
pub struct NullKeyStorage {
    files: Mutex<BTreeMap<u32, KeyFile>>,
}

impl NullKeyStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.files().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files().is_empty()
    }

    fn files(&self) -> MutexGuard<'_, BTreeMap<u32, KeyFile>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyStorage for NullKeyStorage {
    fn put(&self, file: &KeyFile) -> Result<(), KinError> {
        self.files().insert(file.index, file.clone());
        Ok(())
    }

    fn get(&self, index: u32) -> Result<Option<KeyFile>, KinError> {
        Ok(self.files().get(&index).cloned())
    }

    fn remove(&self, index: u32) -> Result<bool, KinError> {
        Ok(self.files().remove(&index).is_some())
    }

    fn indices(&self) -> Result<Vec<u32>, KinError> {
        Ok(self.files().keys().copied().collect())
    }

    fn clear(&self) -> Result<(), KinError> {
        self.files().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kin_types::{Address, PrivateKey};
    use kin_wallet_core::keyfile::encrypt_key;
    use kin_wallet_core::KdfParams;

    fn key_file(index: u32) -> KeyFile {
        encrypt_key(
            &PrivateKey([1u8; 32]),
            index,
            Address::from_bytes([index as u8; 20]),
            "pass",
            KdfParams::light(),
        )
        .unwrap()
    }

    #[test]
    fn behaves_like_a_map_keyed_by_index() {
        let storage = NullKeyStorage::new();
        assert!(storage.is_empty());

        storage.put(&key_file(4)).unwrap();
        storage.put(&key_file(2)).unwrap();
        assert_eq!(storage.indices().unwrap(), vec![2, 4]);
        assert_eq!(storage.get(4).unwrap().unwrap().index, 4);

        assert!(storage.remove(4).unwrap());
        assert!(!storage.remove(4).unwrap());
        storage.clear().unwrap();
        assert_eq!(storage.len(), 0);
    }
}
