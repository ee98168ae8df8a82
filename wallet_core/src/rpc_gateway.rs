//! JSON-RPC ledger gateway over HTTP.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use kin_types::{Address, Balance, TxHandle, TxStatus};

use crate::error::KinError;
use crate::gateway::LedgerGateway;
use crate::transfer::SignedTransfer;

/// Node error text for an address with no on-chain presence.
const ACCOUNT_NOT_FOUND: &str = "account not found";

/// Blocking JSON-RPC client for a ledger node.
///
/// Wraps `reqwest::blocking::Client` with the node's URL. Every request is
/// sent once; timeouts come from the HTTP client and surface as
/// [`KinError::Network`].
#[derive(Clone)]
pub struct RpcGateway {
    http: reqwest::blocking::Client,
    node_url: String,
}

impl RpcGateway {
    /// Create a gateway targeting e.g. `http://127.0.0.1:8545`.
    pub fn new(node_url: impl Into<String>) -> Result<Self, KinError> {
        Self::with_timeouts(node_url, Duration::from_secs(30), Duration::from_secs(10))
    }

    pub fn with_timeouts(
        node_url: impl Into<String>,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, KinError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| KinError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            node_url: node_url.into(),
        })
    }

    pub fn node_url(&self) -> &str {
        &self.node_url
    }

    /// Send one request and return its `result` field.
    fn rpc_call(
        &self,
        action: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, KinError> {
        let mut body = params;
        body.as_object_mut()
            .ok_or_else(|| KinError::Other("params must be a JSON object".into()))?
            .insert("action".to_string(), serde_json::json!(action));

        tracing::trace!(action, url = %self.node_url, "rpc request");
        let response = self
            .http
            .post(&self.node_url)
            .json(&body)
            .send()
            .map_err(|e| KinError::Network(format!("{action} request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(KinError::Network(format!(
                "{action}: node returned HTTP {}",
                response.status()
            )));
        }

        let json: serde_json::Value = response
            .json()
            .map_err(|e| KinError::Decoding(format!("{action}: invalid JSON response: {e}")))?;
        unwrap_envelope(action, json)
    }

    fn fetch_balance(&self, action: &str, address: &Address) -> Result<Balance, KinError> {
        let params = serde_json::json!({ "account": address.to_string() });
        match self.rpc_call(action, params) {
            Ok(result) => {
                let resp: BalanceResult = decode(action, result)?;
                parse_quarks(action, &resp.balance)
            }
            Err(KinError::Network(msg)) if msg.ends_with(ACCOUNT_NOT_FOUND) => {
                tracing::debug!(%address, "{action}: unknown account resolves to zero");
                Ok(Balance::ZERO)
            }
            Err(e) => Err(e),
        }
    }
}

impl LedgerGateway for RpcGateway {
    fn balance(&self, address: &Address) -> Result<Balance, KinError> {
        self.fetch_balance("account_balance", address)
    }

    fn pending_balance(&self, address: &Address) -> Result<Balance, KinError> {
        self.fetch_balance("account_pending_balance", address)
    }

    fn broadcast(&self, transfer: &SignedTransfer) -> Result<TxHandle, KinError> {
        let action = "send_transaction";
        let result = self.rpc_call(
            action,
            serde_json::json!({ "transaction": transfer.to_raw_hex()? }),
        )?;
        let resp: SendResult = decode(action, result)?;
        accepted_handle(resp, &transfer.handle)
    }

    fn status(&self, handle: &TxHandle) -> Result<TxStatus, KinError> {
        let action = "transaction_status";
        let result = self.rpc_call(action, serde_json::json!({ "hash": handle.to_string() }))?;
        let resp: StatusResult = decode(action, result)?;
        Ok(resp.status)
    }
}

// ── Response types ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
struct BalanceResult {
    /// Decimal quark count.
    balance: String,
}

#[derive(Debug, Clone, Deserialize)]
struct SendResult {
    hash: String,
    accepted: bool,
    #[serde(default)]
    detail: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct StatusResult {
    status: TxStatus,
}

// ── Decoding helpers ────────────────────────────────────────────────────

fn unwrap_envelope(action: &str, json: serde_json::Value) -> Result<serde_json::Value, KinError> {
    if let Some(err) = json.get("error").and_then(|e| e.as_str()) {
        return Err(KinError::Network(format!("{action}: node error: {err}")));
    }
    Ok(json.get("result").cloned().unwrap_or(json))
}

fn decode<T: DeserializeOwned>(action: &str, value: serde_json::Value) -> Result<T, KinError> {
    serde_json::from_value(value)
        .map_err(|e| KinError::Decoding(format!("invalid {action} response: {e}")))
}

fn parse_quarks(action: &str, s: &str) -> Result<Balance, KinError> {
    s.parse::<u128>()
        .map(Balance::from_quarks)
        .map_err(|e| KinError::Decoding(format!("{action}: invalid balance {s:?}: {e}")))
}

fn accepted_handle(resp: SendResult, expected: &TxHandle) -> Result<TxHandle, KinError> {
    if !resp.accepted {
        return Err(KinError::Network(format!(
            "node rejected transaction: {}",
            resp.detail.as_deref().unwrap_or("no detail")
        )));
    }
    let handle: TxHandle = resp
        .hash
        .parse()
        .map_err(|e| KinError::Decoding(format!("send_transaction: {e}")))?;
    if handle != *expected {
        return Err(KinError::Decoding(format!(
            "node reported hash {handle}, expected {expected}"
        )));
    }
    Ok(handle)
}
