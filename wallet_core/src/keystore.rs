//! Account key lifecycle: create, unlock, delete.
//!
//! The `KeyStore` owns every encrypted key through a [`KeyStorage`] backend.
//! Decrypted keys exist only inside an [`UnlockedKey`], which wipes them on
//! drop. Locking is per account index: signing takes a shared [`KeyLease`] on
//! its own index and deletion takes that index exclusively, so once
//! `delete_account` returns no signer can still be holding that key, while
//! other accounts are never held up.

use std::collections::HashMap;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use kin_crypto::{derive_address, generate_keypair, keypair_from_private, keypair_from_seed};
use kin_types::{Address, KeyPair, PublicKey, Signature};

use crate::error::KinError;
use crate::keyfile::{decrypt_key, encrypt_key, KdfParams, KeyFile};
use crate::storage::KeyStorage;

/// An account entry as seen without its passphrase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoredAccount {
    pub index: u32,
    pub address: Address,
}

pub struct KeyStore {
    storage: Box<dyn KeyStorage>,
    kdf: KdfParams,
    locks: IndexLocks,
    /// Serialises index allocation and the scans that precede it.
    allocation: Mutex<()>,
}

impl KeyStore {
    pub fn new(storage: impl KeyStorage + 'static, kdf: KdfParams) -> Self {
        Self {
            storage: Box::new(storage),
            kdf,
            locks: IndexLocks::default(),
            allocation: Mutex::new(()),
        }
    }

    /// Create a new account key, encrypt it under `passphrase`, and persist it.
    ///
    /// With `seed_index`, the key comes from the public sandbox seed table;
    /// otherwise it is freshly random. The entry is durably stored before this
    /// returns. Creating a seed account whose address is already stored
    /// returns the existing entry once `passphrase` is shown to unlock it.
    pub fn create_account(
        &self,
        passphrase: &str,
        seed_index: Option<usize>,
    ) -> Result<StoredAccount, KinError> {
        let keys = match seed_index {
            Some(i) => {
                let seed = kin_crypto::sandbox_seed(i).ok_or_else(|| {
                    KinError::Keystore(format!("no sandbox seed at index {i}"))
                })?;
                keypair_from_seed(&seed)
            }
            None => generate_keypair(),
        };
        let address = derive_address(&keys.public);

        let _allocating = lock(&self.allocation);
        for existing in self.list()? {
            if existing.address == address {
                let _lease = self.locks.shared(existing.index);
                self.decrypt(existing.index, passphrase)?;
                tracing::debug!(index = existing.index, %address, "seed account already stored");
                return Ok(existing);
            }
        }
        self.persist(keys, passphrase)
    }

    /// Return the first stored account that `passphrase` unlocks, creating a
    /// random one if none does.
    pub fn create_account_if_needed(&self, passphrase: &str) -> Result<StoredAccount, KinError> {
        let _allocating = lock(&self.allocation);
        for existing in self.list()? {
            let _lease = self.locks.shared(existing.index);
            match self.decrypt(existing.index, passphrase) {
                Ok(_) => return Ok(existing),
                Err(KinError::Authentication { .. } | KinError::AccountDeleted(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        self.persist(generate_keypair(), passphrase)
    }

    /// Irreversibly erase the key at `index`.
    ///
    /// Fails with `Authentication` if `passphrase` does not decrypt it and
    /// with `AccountDeleted` if it is already gone. Waits for in-flight
    /// signers on this index to release their lease first; other indices are
    /// unaffected.
    pub fn delete_account(&self, index: u32, passphrase: &str) -> Result<(), KinError> {
        let _exclusive = self.locks.exclusive(index);
        self.decrypt(index, passphrase)?;
        self.storage.remove(index)?;
        tracing::info!(index, "deleted account key");
        Ok(())
    }

    /// Erase every key. Used for full teardown.
    pub fn delete_all(&self) -> Result<(), KinError> {
        let _allocating = lock(&self.allocation);
        let indices = self.storage.indices()?;
        let _exclusive: Vec<IndexGuard<'_>> =
            indices.iter().map(|&index| self.locks.exclusive(index)).collect();
        self.storage.clear()?;
        tracing::info!(count = indices.len(), "deleted all account keys");
        Ok(())
    }

    /// Decrypt whatever key is stored at `index` for a single signing
    /// operation.
    pub fn unlock(&self, index: u32, passphrase: &str) -> Result<UnlockedKey, KinError> {
        let _lease = self.locks.shared(index);
        self.decrypt(index, passphrase)
    }

    /// Hold the key for account `index` at `address` against deletion until
    /// the lease is dropped.
    ///
    /// Fails with `AccountDeleted` if the entry is gone, or if the index now
    /// belongs to a different key than the one `address` was derived from.
    pub fn lease(&self, index: u32, address: &Address) -> Result<KeyLease<'_>, KinError> {
        let guard = self.locks.shared(index);
        let file = self
            .storage
            .get(index)?
            .ok_or(KinError::AccountDeleted(index))?;
        if file.address != *address {
            tracing::debug!(index, expected = %address, stored = %file.address, "index reassigned");
            return Err(KinError::AccountDeleted(index));
        }
        Ok(KeyLease {
            store: self,
            index,
            address: file.address,
            _guard: guard,
        })
    }

    /// Stored accounts in index order, without decrypting anything.
    pub fn accounts(&self) -> Result<Vec<StoredAccount>, KinError> {
        self.list()
    }

    pub fn contains(&self, index: u32) -> Result<bool, KinError> {
        Ok(self.storage.get(index)?.is_some())
    }

    fn list(&self) -> Result<Vec<StoredAccount>, KinError> {
        let mut out = Vec::new();
        for index in self.storage.indices()? {
            if let Some(file) = self.storage.get(index)? {
                out.push(StoredAccount {
                    index,
                    address: file.address,
                });
            }
        }
        Ok(out)
    }

    fn next_index(&self) -> Result<u32, KinError> {
        match self.storage.indices()?.last() {
            None => Ok(0),
            Some(last) => last
                .checked_add(1)
                .ok_or_else(|| KinError::Keystore("account index space exhausted".to_string())),
        }
    }

    // Callers hold `allocation`.
    fn persist(&self, keys: KeyPair, passphrase: &str) -> Result<StoredAccount, KinError> {
        let index = self.next_index()?;
        let address = derive_address(&keys.public);
        let file = encrypt_key(&keys.private, index, address, passphrase, self.kdf)?;
        self.storage.put(&file)?;
        tracing::info!(index, %address, "created account key");
        Ok(StoredAccount { index, address })
    }

    fn decrypt(&self, index: u32, passphrase: &str) -> Result<UnlockedKey, KinError> {
        let file: KeyFile = self
            .storage
            .get(index)?
            .ok_or(KinError::AccountDeleted(index))?;
        let keys = keypair_from_private(decrypt_key(&file, passphrase)?);
        if derive_address(&keys.public) != file.address {
            return Err(KinError::Keystore(format!(
                "key file {index} does not match its recorded address"
            )));
        }
        Ok(UnlockedKey { keys })
    }
}

// The guarded state stays consistent across a panic, so poisoning is ignored.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Per-index locks ─────────────────────────────────────────────────────

#[derive(Default)]
struct Hold {
    readers: usize,
    writer: bool,
    writers_waiting: usize,
}

impl Hold {
    fn is_idle(&self) -> bool {
        self.readers == 0 && !self.writer && self.writers_waiting == 0
    }
}

/// One reader/writer lock per account index, created on first use and
/// dropped once idle. A waiting writer holds off new readers.
#[derive(Default)]
struct IndexLocks {
    holds: Mutex<HashMap<u32, Hold>>,
    released: Condvar,
}

impl IndexLocks {
    fn shared(&self, index: u32) -> IndexGuard<'_> {
        let mut holds = lock(&self.holds);
        while holds
            .get(&index)
            .is_some_and(|h| h.writer || h.writers_waiting > 0)
        {
            holds = self.wait(holds);
        }
        holds.entry(index).or_default().readers += 1;
        IndexGuard {
            locks: self,
            index,
            exclusive: false,
        }
    }

    fn exclusive(&self, index: u32) -> IndexGuard<'_> {
        let mut holds = lock(&self.holds);
        holds.entry(index).or_default().writers_waiting += 1;
        while holds
            .get(&index)
            .is_some_and(|h| h.writer || h.readers > 0)
        {
            holds = self.wait(holds);
        }
        let hold = holds.entry(index).or_default();
        hold.writers_waiting -= 1;
        hold.writer = true;
        IndexGuard {
            locks: self,
            index,
            exclusive: true,
        }
    }

    fn wait<'a>(
        &self,
        guard: MutexGuard<'a, HashMap<u32, Hold>>,
    ) -> MutexGuard<'a, HashMap<u32, Hold>> {
        self.released
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, index: u32, exclusive: bool) {
        let mut holds = lock(&self.holds);
        if let Some(hold) = holds.get_mut(&index) {
            if exclusive {
                hold.writer = false;
            } else {
                hold.readers = hold.readers.saturating_sub(1);
            }
            if hold.is_idle() {
                holds.remove(&index);
            }
        }
        self.released.notify_all();
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        lock(&self.holds).len()
    }
}

struct IndexGuard<'a> {
    locks: &'a IndexLocks,
    index: u32,
    exclusive: bool,
}

impl Drop for IndexGuard<'_> {
    fn drop(&mut self) {
        self.locks.release(self.index, self.exclusive);
    }
}

/// Shared hold on one account's key entry.
///
/// While any lease on an index is alive, `delete_account` for that index and
/// `delete_all` block.
pub struct KeyLease<'a> {
    store: &'a KeyStore,
    index: u32,
    address: Address,
    _guard: IndexGuard<'a>,
}

impl KeyLease<'_> {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn unlock(&self, passphrase: &str) -> Result<UnlockedKey, KinError> {
        self.store.decrypt(self.index, passphrase)
    }
}

/// A decrypted key pair scoped to one signing operation.
///
/// Not `Clone` or `Debug`; the private half is zeroized when this drops, on
/// every exit path.
pub struct UnlockedKey {
    keys: KeyPair,
}

impl UnlockedKey {
    pub fn public_key(&self) -> PublicKey {
        self.keys.public
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        kin_crypto::sign_message(message, &self.keys.private)
    }
}
