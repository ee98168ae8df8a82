//! The account registry for one network.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use kin_types::{NetworkId, TxHandle, TxStatus};

use crate::account::Account;
use crate::completion::Dispatcher;
use crate::config::{NetworkConfig, WalletConfig};
use crate::error::KinError;
use crate::gateway::LedgerGateway;
use crate::keystore::{KeyStore, StoredAccount};
use crate::rpc_gateway::RpcGateway;
use crate::storage::FileKeyStorage;

/// Owns the accounts of one network together with their keystore and
/// gateway.
///
/// There is no process-wide state: every `Client` is constructed explicitly
/// and torn down explicitly with [`delete_keystore`](Self::delete_keystore).
pub struct Client {
    config: NetworkConfig,
    keystore: Arc<KeyStore>,
    gateway: Arc<dyn LedgerGateway>,
    dispatcher: Dispatcher,
    registry: Mutex<BTreeMap<u32, Account>>,
    statuses: Mutex<HashMap<TxHandle, TxStatus>>,
}

impl Client {
    /// Build a client over an existing keystore. Accounts already stored in
    /// it are registered immediately.
    ///
    /// Non-blocking calls run on the current tokio runtime if there is one,
    /// otherwise on a small runtime owned by the client and its accounts.
    pub fn new(
        config: NetworkConfig,
        keystore: KeyStore,
        gateway: impl LedgerGateway + 'static,
    ) -> Result<Self, KinError> {
        Self::with_dispatcher(config, keystore, gateway, Dispatcher::new()?)
    }

    /// Like [`new`](Self::new), with non-blocking calls run by `dispatcher`.
    pub fn with_dispatcher(
        config: NetworkConfig,
        keystore: KeyStore,
        gateway: impl LedgerGateway + 'static,
        dispatcher: Dispatcher,
    ) -> Result<Self, KinError> {
        config.validate()?;
        let client = Self {
            config,
            keystore: Arc::new(keystore),
            gateway: Arc::new(gateway),
            dispatcher,
            registry: Mutex::new(BTreeMap::new()),
            statuses: Mutex::new(HashMap::new()),
        };

        let stored = client.keystore.accounts()?;
        {
            let mut registry = client.registry();
            for entry in &stored {
                registry.insert(entry.index, client.make_account(entry));
            }
        }
        tracing::info!(
            network = %client.config.network,
            endpoint = %client.config.node_endpoint,
            accounts = stored.len(),
            "wallet client ready"
        );
        Ok(client)
    }

    /// Client backed by key files under `config.keystore_dir` and a JSON-RPC
    /// node at `config.network.node_endpoint`.
    pub fn open(config: &WalletConfig) -> Result<Self, KinError> {
        let storage = FileKeyStorage::open(&config.keystore_dir)?;
        let keystore = KeyStore::new(storage, config.kdf);
        let gateway = RpcGateway::new(config.network.node_endpoint.clone())?;
        Self::new(config.network.clone(), keystore, gateway)
    }

    pub fn network(&self) -> NetworkId {
        self.config.network
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    // ── Account lifecycle ───────────────────────────────────────────────

    /// New account with a freshly generated key.
    pub fn create_account(&self, passphrase: &str) -> Result<Account, KinError> {
        let stored = self.keystore.create_account(passphrase, None)?;
        Ok(self.register(&stored))
    }

    /// Account derived from the public seed table. Only networks whose
    /// funding policy pre-funds seed accounts allow this.
    pub fn create_seeded_account(
        &self,
        seed_index: usize,
        passphrase: &str,
    ) -> Result<Account, KinError> {
        if !self.config.funding.allows_seed_accounts() {
            return Err(KinError::SeedNotAllowed {
                network: self.config.network,
            });
        }
        if self.config.funding.seed_starting_balance(seed_index).is_none() {
            return Err(KinError::Keystore(format!(
                "seed index {seed_index} is outside this network's seed table"
            )));
        }
        let stored = self.keystore.create_account(passphrase, Some(seed_index))?;
        Ok(self.register(&stored))
    }

    /// The first account `passphrase` unlocks, or a new one.
    pub fn create_account_if_needed(&self, passphrase: &str) -> Result<Account, KinError> {
        let stored = self.keystore.create_account_if_needed(passphrase)?;
        Ok(self.register(&stored))
    }

    /// Erase the key at `index`. Irreversible.
    ///
    /// Blocks until in-flight sends on this index have released their lease;
    /// sends on other accounts neither block it nor are blocked by it. Any
    /// send started afterwards on this index fails with `AccountDeleted`.
    pub fn delete_account(&self, index: u32, passphrase: &str) -> Result<(), KinError> {
        self.keystore.delete_account(index, passphrase)?;
        self.registry().remove(&index);
        Ok(())
    }

    /// Erase every persisted key and forget every account.
    pub fn delete_keystore(&self) -> Result<(), KinError> {
        self.keystore.delete_all()?;
        self.registry().clear();
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        tracing::info!(network = %self.config.network, "keystore torn down");
        Ok(())
    }

    /// Registered accounts in index order.
    pub fn accounts(&self) -> Vec<Account> {
        self.registry().values().cloned().collect()
    }

    pub fn account(&self, index: u32) -> Option<Account> {
        self.registry().get(&index).cloned()
    }

    // ── Status ──────────────────────────────────────────────────────────

    /// Poll the status of a submitted transfer.
    ///
    /// Once a handle has been seen `Confirmed` or `Failed` through this
    /// client, later polls keep reporting that status even if the gateway
    /// regresses to `Pending`.
    pub fn status(&self, handle: &TxHandle) -> Result<TxStatus, KinError> {
        let observed = self.gateway.status(handle)?;
        let mut statuses = self.statuses.lock().unwrap_or_else(PoisonError::into_inner);
        let status = match statuses.get(handle) {
            Some(previous) => previous.merge(observed),
            None => observed,
        };
        if status != observed {
            tracing::warn!(%handle, %status, %observed, "ignoring status regression from node");
        }
        statuses.insert(*handle, status);
        Ok(status)
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn registry(&self) -> MutexGuard<'_, BTreeMap<u32, Account>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn make_account(&self, stored: &StoredAccount) -> Account {
        Account::new(
            stored.index,
            stored.address,
            self.config.network,
            Arc::clone(&self.keystore),
            Arc::clone(&self.gateway),
            self.dispatcher.clone(),
        )
    }

    fn register(&self, stored: &StoredAccount) -> Account {
        let account = self.make_account(stored);
        self.registry().insert(stored.index, account.clone());
        account
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyfile::KdfParams;
    use crate::transfer::SignedTransfer;
    use kin_types::{Address, Balance};

    /// Gateway whose status answer can be changed between polls.
    struct ScriptedStatus(Mutex<TxStatus>);

    impl ScriptedStatus {
        fn set(&self, status: TxStatus) {
            *self.0.lock().unwrap() = status;
        }
    }

    impl LedgerGateway for ScriptedStatus {
        fn balance(&self, _address: &Address) -> Result<Balance, KinError> {
            Ok(Balance::ZERO)
        }

        fn pending_balance(&self, _address: &Address) -> Result<Balance, KinError> {
            Ok(Balance::ZERO)
        }

        fn broadcast(&self, transfer: &SignedTransfer) -> Result<TxHandle, KinError> {
            Ok(transfer.handle)
        }

        fn status(&self, _handle: &TxHandle) -> Result<TxStatus, KinError> {
            Ok(*self.0.lock().unwrap())
        }
    }

    fn keystore(dir: &tempfile::TempDir) -> KeyStore {
        KeyStore::new(FileKeyStorage::open(dir.path()).unwrap(), KdfParams::light())
    }

    fn client(config: NetworkConfig) -> (tempfile::TempDir, Client, Arc<ScriptedStatus>) {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Arc::new(ScriptedStatus(Mutex::new(TxStatus::Pending)));
        let client = Client::new(config, keystore(&dir), gateway.clone()).unwrap();
        (dir, client, gateway)
    }

    #[test]
    fn registry_tracks_create_and_delete() {
        let (_dir, client, _) = client(NetworkConfig::sandbox());
        let a = client.create_account("pass").unwrap();
        let b = client.create_account("pass").unwrap();
        assert_eq!(
            client.accounts().iter().map(Account::index).collect::<Vec<_>>(),
            vec![a.index(), b.index()]
        );

        client.delete_account(a.index(), "pass").unwrap();
        assert!(client.account(a.index()).is_none());
        assert_eq!(client.account(b.index()).unwrap().address(), b.address());
    }

    #[test]
    fn existing_keys_are_registered_on_construction() {
        let dir = tempfile::tempdir().unwrap();
        let stored = keystore(&dir).create_account("pass", None).unwrap();

        let gateway = ScriptedStatus(Mutex::new(TxStatus::Pending));
        let client = Client::new(NetworkConfig::sandbox(), keystore(&dir), gateway).unwrap();
        let account = client.account(stored.index).expect("registered");
        assert_eq!(account.address(), stored.address);
    }

    #[test]
    fn seeded_accounts_need_a_seed_funded_network() {
        let (_dir, client, _) = client(NetworkConfig::testnet("http://node.invalid", None));
        assert!(matches!(
            client.create_seeded_account(0, "pass"),
            Err(KinError::SeedNotAllowed { network: NetworkId::Testnet })
        ));
        assert!(client.accounts().is_empty());
    }

    #[test]
    fn seed_index_outside_policy_is_rejected() {
        let (_dir, client, _) = client(NetworkConfig::sandbox());
        assert!(matches!(
            client.create_seeded_account(kin_crypto::SANDBOX_SEED_COUNT, "pass"),
            Err(KinError::Keystore(_))
        ));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = NetworkConfig::mainnet("http://node.invalid");
        config.funding = NetworkConfig::sandbox().funding;
        let gateway = ScriptedStatus(Mutex::new(TxStatus::Pending));
        assert!(matches!(
            Client::new(config, keystore(&dir), gateway),
            Err(KinError::Config(_))
        ));
    }

    #[test]
    fn status_never_regresses_from_terminal() {
        let (_dir, client, gateway) = client(NetworkConfig::sandbox());
        let handle = TxHandle::new([9u8; 32]);

        assert_eq!(client.status(&handle).unwrap(), TxStatus::Pending);
        gateway.set(TxStatus::Confirmed);
        assert_eq!(client.status(&handle).unwrap(), TxStatus::Confirmed);
        gateway.set(TxStatus::Pending);
        assert_eq!(client.status(&handle).unwrap(), TxStatus::Confirmed);
    }

    #[test]
    fn delete_keystore_forgets_everything() {
        let (dir, client, _) = client(NetworkConfig::sandbox());
        client.create_account("pass").unwrap();
        client.create_seeded_account(0, "pass").unwrap();
        client.delete_keystore().unwrap();

        assert!(client.accounts().is_empty());
        assert!(keystore(&dir).accounts().unwrap().is_empty());
    }
}
