//! Persistence backends for encrypted key files.
//!
//! The `KeyStore` depends only on the [`KeyStorage`] trait. `FileKeyStorage`
//! writes one JSON file per account index; the in-memory
//! `kin_nullables::NullKeyStorage` is used in tests.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::KinError;
use crate::keyfile::KeyFile;

/// Storage for encrypted key files, addressable by account index.
///
/// Implementations must be safe to call from several threads; the `KeyStore`
/// already serialises writes against each other.
pub trait KeyStorage: Send + Sync {
    /// Durably store `file` under `file.index`, replacing any previous entry.
    fn put(&self, file: &KeyFile) -> Result<(), KinError>;
    fn get(&self, index: u32) -> Result<Option<KeyFile>, KinError>;
    /// Erase the entry. Returns whether one existed.
    fn remove(&self, index: u32) -> Result<bool, KinError>;
    /// All stored indices in ascending order.
    fn indices(&self) -> Result<Vec<u32>, KinError>;
    fn clear(&self) -> Result<(), KinError>;
}

const FILE_PREFIX: &str = "account-";
const FILE_SUFFIX: &str = ".json";

/// Key files on disk: `<dir>/account-<index>.json`.
pub struct FileKeyStorage {
    dir: PathBuf,
}

impl FileKeyStorage {
    /// Open (creating if needed) a key directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, KinError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            KinError::Keystore(format!("failed to create {}: {e}", dir.display()))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, index: u32) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}{index}{FILE_SUFFIX}"))
    }

    fn index_of(name: &str) -> Option<u32> {
        name.strip_prefix(FILE_PREFIX)?
            .strip_suffix(FILE_SUFFIX)?
            .parse()
            .ok()
    }
}

impl KeyStorage for FileKeyStorage {
    fn put(&self, file: &KeyFile) -> Result<(), KinError> {
        let json = serde_json::to_vec_pretty(file)
            .map_err(|e| KinError::Keystore(format!("JSON serialization failed: {e}")))?;

        // Write to a temp file, sync, then rename so a crash never leaves a
        // half-written entry under the real name.
        let path = self.path_for(file.index);
        let tmp = path.with_extension("json.tmp");
        let write = || -> std::io::Result<()> {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(&json)?;
            f.sync_all()?;
            fs::rename(&tmp, &path)?;
            if let Ok(d) = fs::File::open(&self.dir) {
                let _ = d.sync_all();
            }
            Ok(())
        };
        write().map_err(|e| {
            let _ = fs::remove_file(&tmp);
            KinError::Keystore(format!("failed to write {}: {e}", path.display()))
        })
    }

    fn get(&self, index: u32) -> Result<Option<KeyFile>, KinError> {
        let path = self.path_for(index);
        let json = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(KinError::Keystore(format!(
                    "failed to read {}: {e}",
                    path.display()
                )))
            }
        };
        let file: KeyFile = serde_json::from_slice(&json)
            .map_err(|e| KinError::Keystore(format!("invalid key file {}: {e}", path.display())))?;
        if file.index != index {
            return Err(KinError::Keystore(format!(
                "key file {} claims index {}",
                path.display(),
                file.index
            )));
        }
        Ok(Some(file))
    }

    fn remove(&self, index: u32) -> Result<bool, KinError> {
        let path = self.path_for(index);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(KinError::Keystore(format!(
                "failed to remove {}: {e}",
                path.display()
            ))),
        }
    }

    fn indices(&self) -> Result<Vec<u32>, KinError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            KinError::Keystore(format!("failed to list {}: {e}", self.dir.display()))
        })?;
        let mut indices: Vec<u32> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str().and_then(Self::index_of))
            .collect();
        indices.sort_unstable();
        Ok(indices)
    }

    fn clear(&self) -> Result<(), KinError> {
        for index in self.indices()? {
            self.remove(index)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyfile::{encrypt_key, KdfParams};
    use kin_types::{Address, PrivateKey};

    fn key_file(index: u32) -> KeyFile {
        encrypt_key(
            &PrivateKey([index as u8; 32]),
            index,
            Address::from_bytes([index as u8; 20]),
            "pass",
            KdfParams::light(),
        )
        .unwrap()
    }

    #[test]
    fn put_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileKeyStorage::open(dir.path()).unwrap();

        storage.put(&key_file(0)).unwrap();
        let loaded = storage.get(0).unwrap().expect("stored");
        assert_eq!(loaded.address, Address::from_bytes([0u8; 20]));
        assert!(dir.path().join("account-0.json").exists());

        assert!(storage.remove(0).unwrap());
        assert!(!storage.remove(0).unwrap());
        assert!(storage.get(0).unwrap().is_none());
    }

    #[test]
    fn indices_are_sorted_and_ignore_strangers() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileKeyStorage::open(dir.path()).unwrap();
        for i in [5, 1, 3] {
            storage.put(&key_file(i)).unwrap();
        }
        fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        fs::write(dir.path().join("account-x.json"), b"{}").unwrap();

        assert_eq!(storage.indices().unwrap(), vec![1, 3, 5]);
    }

    #[test]
    fn clear_removes_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileKeyStorage::open(dir.path()).unwrap();
        storage.put(&key_file(0)).unwrap();
        storage.put(&key_file(1)).unwrap();
        storage.clear().unwrap();
        assert!(storage.indices().unwrap().is_empty());
    }

    #[test]
    fn reopened_storage_sees_persisted_entries() {
        let dir = tempfile::tempdir().unwrap();
        FileKeyStorage::open(dir.path())
            .unwrap()
            .put(&key_file(2))
            .unwrap();
        let reopened = FileKeyStorage::open(dir.path()).unwrap();
        assert_eq!(reopened.indices().unwrap(), vec![2]);
    }

    #[test]
    fn mismatched_index_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileKeyStorage::open(dir.path()).unwrap();
        storage.put(&key_file(1)).unwrap();
        fs::rename(dir.path().join("account-1.json"), dir.path().join("account-9.json")).unwrap();
        assert!(matches!(storage.get(9), Err(KinError::Keystore(_))));
    }
}
