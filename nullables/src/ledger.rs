//! Nullable ledger: an in-memory node that settles transfers on command.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use kin_crypto::{derive_address, keypair_from_seed, sandbox_seed, SANDBOX_SEED_COUNT};
use kin_types::{Address, Balance, TxHandle, TxStatus};
use kin_wallet_core::{KinError, LedgerGateway, NetworkConfig, SignedTransfer, Transfer};

struct Submitted {
    transfer: Transfer,
    status: TxStatus,
    polls: u32,
}

#[derive(Default)]
struct LedgerState {
    chain_id: Option<u32>,
    balances: HashMap<Address, Balance>,
    transfers: HashMap<TxHandle, Submitted>,
    /// Submission order, for `confirm_all`.
    order: Vec<TxHandle>,
    auto_confirm: bool,
    confirm_after_polls: Option<u32>,
    fail_next: Option<String>,
    offline: bool,
    reject_zero_amounts: bool,
    broadcasts: usize,
}

impl LedgerState {
    fn balance_of(&self, address: &Address) -> Balance {
        self.balances.get(address).copied().unwrap_or(Balance::ZERO)
    }

    /// Apply a pending transfer. Fails it if the sender cannot cover it at
    /// settlement time.
    fn settle(&mut self, handle: &TxHandle) -> Option<TxStatus> {
        let (from, to, amount) = match self.transfers.get(handle) {
            Some(s) if s.status == TxStatus::Pending => {
                (s.transfer.from, s.transfer.to, s.transfer.amount)
            }
            Some(s) => return Some(s.status),
            None => return None,
        };

        let status = match self.balance_of(&from).checked_sub(amount) {
            Some(remaining) => {
                self.balances.insert(from, remaining);
                let credited = self.balance_of(&to).saturating_add(amount);
                self.balances.insert(to, credited);
                TxStatus::Confirmed
            }
            None => TxStatus::Failed,
        };
        if let Some(s) = self.transfers.get_mut(handle) {
            s.status = status;
        }
        tracing::debug!(%handle, %status, "null ledger settled transfer");
        Some(status)
    }
}

/// In-memory [`LedgerGateway`].
///
/// Broadcast transfers are held `Pending` until confirmed explicitly, by
/// polling, or immediately when auto-confirm is on. Failures can be injected
/// for the next broadcast or for every call.
#[derive(Default)]
pub struct NullLedger {
    state: Mutex<LedgerState>,
}

impl NullLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger for `config`'s network, with every seed account the funding
    /// policy pre-funds already holding its starting balance.
    pub fn for_network(config: &NetworkConfig) -> Self {
        let ledger = Self::new();
        ledger.state().chain_id = Some(config.network.chain_id());
        for index in 0..SANDBOX_SEED_COUNT {
            let (Some(seed), Some(balance)) = (
                sandbox_seed(index),
                config.funding.seed_starting_balance(index),
            ) else {
                continue;
            };
            let address = derive_address(&keypair_from_seed(&seed).public);
            ledger.fund(&address, balance);
        }
        ledger
    }

    // ── Steering ────────────────────────────────────────────────────────

    /// Add `amount` to the confirmed balance of `address`.
    pub fn fund(&self, address: &Address, amount: Balance) {
        let mut state = self.state();
        let balance = state.balance_of(address).saturating_add(amount);
        state.balances.insert(*address, balance);
    }

    pub fn with_auto_confirm(self) -> Self {
        self.set_auto_confirm(true);
        self
    }

    /// Settle every transfer as soon as it is broadcast.
    pub fn set_auto_confirm(&self, on: bool) {
        self.state().auto_confirm = on;
    }

    /// Settle a transfer on its `polls`-th status query.
    pub fn confirm_after_polls(&self, polls: u32) {
        self.state().confirm_after_polls = Some(polls);
    }

    /// Settle one pending transfer. Returns its resulting status, or `None`
    /// for an unknown handle.
    pub fn confirm(&self, handle: &TxHandle) -> Option<TxStatus> {
        self.state().settle(handle)
    }

    /// Settle every pending transfer in submission order. Returns how many
    /// were settled.
    pub fn confirm_all(&self) -> usize {
        let mut state = self.state();
        let pending: Vec<TxHandle> = state
            .order
            .iter()
            .filter(|h| state.transfers.get(*h).map(|s| s.status) == Some(TxStatus::Pending))
            .copied()
            .collect();
        for handle in &pending {
            state.settle(handle);
        }
        pending.len()
    }

    /// Mark a pending transfer as failed without moving funds.
    pub fn fail(&self, handle: &TxHandle) -> bool {
        let mut state = self.state();
        match state.transfers.get_mut(handle) {
            Some(s) if s.status == TxStatus::Pending => {
                s.status = TxStatus::Failed;
                true
            }
            _ => false,
        }
    }

    /// Make the next broadcast fail with a network error carrying `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.state().fail_next = Some(message.into());
    }

    /// While offline, every call fails with a network error.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Reject zero-amount transfers the way some nodes do.
    pub fn reject_zero_amounts(&self, reject: bool) {
        self.state().reject_zero_amounts = reject;
    }

    // ── Inspection ──────────────────────────────────────────────────────

    /// Broadcast calls received, accepted or not.
    pub fn broadcast_count(&self) -> usize {
        self.state().broadcasts
    }

    pub fn transfer(&self, handle: &TxHandle) -> Option<Transfer> {
        self.state().transfers.get(handle).map(|s| s.transfer.clone())
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reachable(state: &LedgerState) -> Result<(), KinError> {
        if state.offline {
            return Err(KinError::Network("null ledger is offline".to_string()));
        }
        Ok(())
    }
}

impl LedgerGateway for NullLedger {
    fn balance(&self, address: &Address) -> Result<Balance, KinError> {
        let state = self.state();
        Self::reachable(&state)?;
        Ok(state.balance_of(address))
    }

    fn pending_balance(&self, address: &Address) -> Result<Balance, KinError> {
        let state = self.state();
        Self::reachable(&state)?;
        let mut balance = state.balance_of(address);
        for s in state.transfers.values() {
            if s.status != TxStatus::Pending {
                continue;
            }
            if s.transfer.from == *address {
                balance = balance.saturating_sub(s.transfer.amount);
            }
            if s.transfer.to == *address {
                balance = balance.saturating_add(s.transfer.amount);
            }
        }
        Ok(balance)
    }

    fn broadcast(&self, signed: &SignedTransfer) -> Result<TxHandle, KinError> {
        let mut state = self.state();
        state.broadcasts += 1;
        Self::reachable(&state)?;

        if let Some(message) = state.fail_next.take() {
            return Err(KinError::Network(message));
        }
        if !signed.verify() {
            return Err(KinError::Network(
                "node rejected transaction: invalid signature".to_string(),
            ));
        }
        if let Some(chain_id) = state.chain_id {
            if signed.transfer.chain_id != chain_id {
                return Err(KinError::Network(format!(
                    "node rejected transaction: chain id {} on chain {chain_id}",
                    signed.transfer.chain_id
                )));
            }
        }
        if state.reject_zero_amounts && signed.transfer.amount.is_zero() {
            return Err(KinError::Network(
                "node rejected transaction: zero amount".to_string(),
            ));
        }
        if state.transfers.contains_key(&signed.handle) {
            return Err(KinError::Network(
                "node rejected transaction: duplicate".to_string(),
            ));
        }

        let handle = signed.handle;
        state.transfers.insert(
            handle,
            Submitted {
                transfer: signed.transfer.clone(),
                status: TxStatus::Pending,
                polls: 0,
            },
        );
        state.order.push(handle);
        if state.auto_confirm {
            state.settle(&handle);
        }
        Ok(handle)
    }

    fn status(&self, handle: &TxHandle) -> Result<TxStatus, KinError> {
        let mut state = self.state();
        Self::reachable(&state)?;
        let threshold = state.confirm_after_polls;
        let (status, polls) = match state.transfers.get_mut(handle) {
            Some(s) => {
                s.polls += 1;
                (s.status, s.polls)
            }
            None => return Err(KinError::Network(format!("unknown transaction {handle}"))),
        };
        match threshold {
            Some(n) if status == TxStatus::Pending && polls >= n => {
                Ok(state.settle(handle).unwrap_or(status))
            }
            _ => Ok(status),
        }
    }
}
