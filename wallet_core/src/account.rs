//! A single managed account: balances, transfers, and status polling.

use std::fmt;
use std::sync::Arc;

use tokio::sync::oneshot;

use kin_types::{Address, Balance, NetworkId, TxHandle, TxStatus};

use crate::completion::Dispatcher;
use crate::error::KinError;
use crate::gateway::LedgerGateway;
use crate::keystore::KeyStore;
use crate::transfer::Transfer;

/// One address managed by a [`Client`](crate::Client).
///
/// Holds no state beyond its identity and shared handles to the keystore,
/// gateway and dispatcher, so clones are cheap and may be used from any
/// thread. Concurrent calls are individually safe but not serialised against
/// each other: two simultaneous sends can both pass the balance check.
#[derive(Clone)]
pub struct Account {
    ledger: AccountLedger,
    dispatcher: Dispatcher,
}

/// The blocking half of an account; what dispatched work captures.
#[derive(Clone)]
struct AccountLedger {
    index: u32,
    address: Address,
    network: NetworkId,
    keystore: Arc<KeyStore>,
    gateway: Arc<dyn LedgerGateway>,
}

impl Account {
    pub(crate) fn new(
        index: u32,
        address: Address,
        network: NetworkId,
        keystore: Arc<KeyStore>,
        gateway: Arc<dyn LedgerGateway>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            ledger: AccountLedger {
                index,
                address,
                network,
                keystore,
                gateway,
            },
            dispatcher,
        }
    }

    pub fn index(&self) -> u32 {
        self.ledger.index
    }

    pub fn address(&self) -> Address {
        self.ledger.address
    }

    pub fn network(&self) -> NetworkId {
        self.ledger.network
    }

    // ── Confirmed balance ───────────────────────────────────────────────

    /// Confirmed on-chain balance. Blocks for one network round-trip.
    ///
    /// An address that has never been funded resolves to zero.
    pub fn balance(&self) -> Result<Balance, KinError> {
        self.ledger.balance()
    }

    /// Non-blocking [`balance`](Self::balance); `completion` runs exactly once
    /// on a worker thread.
    pub fn balance_with<F>(&self, completion: F)
    where
        F: FnOnce(Result<Balance, KinError>) + Send + 'static,
    {
        let ledger = self.ledger.clone();
        self.dispatcher
            .dispatch("balance", move || ledger.balance(), completion);
    }

    /// Awaitable [`balance`](Self::balance).
    pub fn balance_async(&self) -> oneshot::Receiver<Result<Balance, KinError>> {
        let ledger = self.ledger.clone();
        self.dispatcher
            .dispatch_oneshot("balance", move || ledger.balance())
    }

    // ── Pending balance ─────────────────────────────────────────────────

    /// Confirmed balance adjusted by every still-pending transfer touching
    /// this address. A best-effort snapshot, recomputed on every call.
    pub fn pending_balance(&self) -> Result<Balance, KinError> {
        self.ledger.pending_balance()
    }

    pub fn pending_balance_with<F>(&self, completion: F)
    where
        F: FnOnce(Result<Balance, KinError>) + Send + 'static,
    {
        let ledger = self.ledger.clone();
        self.dispatcher
            .dispatch("pending-balance", move || ledger.pending_balance(), completion);
    }

    pub fn pending_balance_async(&self) -> oneshot::Receiver<Result<Balance, KinError>> {
        let ledger = self.ledger.clone();
        self.dispatcher
            .dispatch_oneshot("pending-balance", move || ledger.pending_balance())
    }

    // ── Transfers ───────────────────────────────────────────────────────

    /// Sign and broadcast a transfer of exactly `kin` whole tokens.
    ///
    /// Validation happens before anything is broadcast: a deleted key fails
    /// with `AccountDeleted`, a wrong passphrase with `Authentication`, and an
    /// amount above the confirmed balance with `InsufficientBalance`. A
    /// broadcast failure is returned as `Network` and is not retried.
    ///
    /// The key entry stays leased until the broadcast returns, so a
    /// concurrent `delete_account` on this index waits for it. Other
    /// accounts are not held up.
    pub fn send_transaction(
        &self,
        to: &Address,
        kin: u64,
        passphrase: &str,
    ) -> Result<TxHandle, KinError> {
        self.ledger.send_transaction(to, kin, passphrase)
    }

    /// Non-blocking [`send_transaction`](Self::send_transaction). Validation
    /// errors arrive through `completion` like any other error.
    pub fn send_transaction_with<F>(&self, to: Address, kin: u64, passphrase: String, completion: F)
    where
        F: FnOnce(Result<TxHandle, KinError>) + Send + 'static,
    {
        let ledger = self.ledger.clone();
        self.dispatcher.dispatch(
            "send",
            move || ledger.send_transaction(&to, kin, &passphrase),
            completion,
        );
    }

    // ── Status ──────────────────────────────────────────────────────────

    /// One status poll. Waiting for confirmation is the caller's loop.
    pub fn status(&self, handle: &TxHandle) -> Result<TxStatus, KinError> {
        let status = self.ledger.gateway.status(handle)?;
        tracing::debug!(%handle, %status, "transaction status");
        Ok(status)
    }
}

impl AccountLedger {
    fn balance(&self) -> Result<Balance, KinError> {
        let balance = self.gateway.balance(&self.address)?;
        tracing::debug!(index = self.index, address = %self.address, %balance, "balance");
        Ok(balance)
    }

    fn pending_balance(&self) -> Result<Balance, KinError> {
        let balance = self.gateway.pending_balance(&self.address)?;
        tracing::debug!(index = self.index, address = %self.address, %balance, "pending balance");
        Ok(balance)
    }

    fn send_transaction(&self, to: &Address, kin: u64, passphrase: &str) -> Result<TxHandle, KinError> {
        let lease = self.keystore.lease(self.index, &self.address)?;

        let signed = {
            let key = lease.unlock(passphrase)?;

            let available = self.balance()?;
            let needed = Balance::from_kin(kin);
            if needed > available {
                tracing::warn!(
                    index = self.index,
                    %needed,
                    %available,
                    "transfer rejected: insufficient balance"
                );
                return Err(KinError::InsufficientBalance { needed, available });
            }

            Transfer::new(self.network, self.address, *to, kin).sign(&key)?
        };

        let handle = self.gateway.broadcast(&signed).map_err(|e| {
            tracing::warn!(index = self.index, handle = %signed.handle, error = %e, "broadcast failed");
            e
        })?;
        drop(lease);

        tracing::info!(
            index = self.index,
            from = %self.address,
            to = %to,
            kin,
            %handle,
            "transfer broadcast"
        );
        Ok(handle)
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("index", &self.ledger.index)
            .field("address", &self.ledger.address)
            .field("network", &self.ledger.network)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyfile::KdfParams;
    use crate::storage::FileKeyStorage;
    use crate::transfer::SignedTransfer;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Gateway with one fixed balance that records what it is asked to send.
    #[derive(Default)]
    struct StubGateway {
        balance: Balance,
        balance_queries: AtomicUsize,
        sent: Mutex<Vec<SignedTransfer>>,
    }

    impl LedgerGateway for StubGateway {
        fn balance(&self, _address: &Address) -> Result<Balance, KinError> {
            self.balance_queries.fetch_add(1, Ordering::SeqCst);
            Ok(self.balance)
        }

        fn pending_balance(&self, _address: &Address) -> Result<Balance, KinError> {
            Ok(self.balance)
        }

        fn broadcast(&self, transfer: &SignedTransfer) -> Result<TxHandle, KinError> {
            self.sent.lock().unwrap().push(transfer.clone());
            Ok(transfer.handle)
        }

        fn status(&self, _handle: &TxHandle) -> Result<TxStatus, KinError> {
            Ok(TxStatus::Pending)
        }
    }

    fn account(kin: u64) -> (tempfile::TempDir, Account, Arc<StubGateway>) {
        let dir = tempfile::tempdir().unwrap();
        let keystore = KeyStore::new(FileKeyStorage::open(dir.path()).unwrap(), KdfParams::light());
        let stored = keystore.create_account("pass", None).unwrap();
        let gateway = Arc::new(StubGateway {
            balance: Balance::from_kin(kin),
            ..Default::default()
        });
        let account = Account::new(
            stored.index,
            stored.address,
            NetworkId::Sandbox,
            Arc::new(keystore),
            gateway.clone(),
            Dispatcher::new().unwrap(),
        );
        (dir, account, gateway)
    }

    fn recipient() -> Address {
        Address::from_bytes([7u8; 20])
    }

    #[test]
    fn send_broadcasts_a_verified_transfer() {
        let (_dir, account, gateway) = account(10);
        let handle = account.send_transaction(&recipient(), 4, "pass").unwrap();

        let sent = gateway.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].handle, handle);
        assert!(sent[0].verify());
        assert_eq!(sent[0].transfer.from, account.address());
        assert_eq!(sent[0].transfer.to, recipient());
        assert_eq!(sent[0].transfer.amount, Balance::from_kin(4));
        assert_eq!(sent[0].transfer.chain_id, NetworkId::Sandbox.chain_id());
    }

    #[test]
    fn exact_balance_may_be_sent() {
        let (_dir, account, _gateway) = account(10);
        assert!(account.send_transaction(&recipient(), 10, "pass").is_ok());
    }

    #[test]
    fn overdraft_is_rejected_before_broadcast() {
        let (_dir, account, gateway) = account(3);
        let err = account.send_transaction(&recipient(), 4, "pass").unwrap_err();
        assert!(matches!(
            err,
            KinError::InsufficientBalance { needed, available }
                if needed == Balance::from_kin(4) && available == Balance::from_kin(3)
        ));
        assert!(gateway.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn wrong_passphrase_is_rejected_before_broadcast() {
        let (_dir, account, gateway) = account(10);
        assert!(matches!(
            account.send_transaction(&recipient(), 1, "nope"),
            Err(KinError::Authentication { .. })
        ));
        assert!(gateway.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn deleted_key_cannot_send() {
        let (_dir, account, gateway) = account(10);
        account
            .ledger
            .keystore
            .delete_account(account.index(), "pass")
            .unwrap();
        assert!(matches!(
            account.send_transaction(&recipient(), 1, "pass"),
            Err(KinError::AccountDeleted(_))
        ));
        assert!(gateway.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn completion_receives_validation_errors() {
        let (_dir, account, _gateway) = account(1);
        let (tx, rx) = std::sync::mpsc::channel();
        account.send_transaction_with(recipient(), 2, "pass".into(), move |result| {
            tx.send(result).unwrap();
        });
        let result = rx.recv_timeout(std::time::Duration::from_secs(10)).unwrap();
        assert!(matches!(result, Err(KinError::InsufficientBalance { .. })));
    }

    #[test]
    fn balance_variants_agree() {
        let (_dir, account, _gateway) = account(25);
        let blocking = account.balance().unwrap();
        let awaited = account.balance_async().blocking_recv().unwrap().unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        account.balance_with(move |result| tx.send(result).unwrap());
        let completed = rx
            .recv_timeout(std::time::Duration::from_secs(10))
            .unwrap()
            .unwrap();
        assert_eq!(blocking, Balance::from_kin(25));
        assert_eq!(awaited, blocking);
        assert_eq!(completed, blocking);
    }

    #[test]
    fn stale_account_on_a_reused_index_is_deleted() {
        let (_dir, account, gateway) = account(10);
        let keystore = Arc::clone(&account.ledger.keystore);
        keystore.delete_account(account.index(), "pass").unwrap();
        let replacement = keystore.create_account("pass", None).unwrap();
        assert_eq!(replacement.index, account.index());

        assert!(matches!(
            account.send_transaction(&recipient(), 1, "pass"),
            Err(KinError::AccountDeleted(i)) if i == account.index()
        ));
        assert_eq!(gateway.balance_queries.load(Ordering::SeqCst), 0);
        assert!(gateway.sent.lock().unwrap().is_empty());
    }
}
