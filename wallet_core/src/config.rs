//! Network and wallet configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use kin_crypto::SANDBOX_SEED_COUNT;
use kin_types::{Balance, NetworkId};

use crate::keyfile::KdfParams;
use crate::KinError;

/// Whole tokens held by every sandbox seed account at genesis.
pub const SANDBOX_STARTING_BALANCE_KIN: u64 = 1_000;

/// Default JSON-RPC endpoint of a local sandbox node.
pub const SANDBOX_NODE_ENDPOINT: &str = "http://127.0.0.1:8545";

/// How accounts on a network come to hold tokens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FundingPolicy {
    /// Deterministic sandbox: the first `seed_count` seed-derived accounts
    /// start with `starting_balance_kin` whole tokens each.
    SeedPrefunded {
        starting_balance_kin: u64,
        seed_count: usize,
    },
    /// Accounts must be funded by an external faucet before use.
    ExternalFaucet {
        #[serde(default)]
        faucet_url: Option<String>,
    },
    /// Production: no funding source.
    Unfunded,
}

impl FundingPolicy {
    /// Whether keys may be derived from the public seed table.
    pub fn allows_seed_accounts(&self) -> bool {
        matches!(self, Self::SeedPrefunded { .. })
    }

    /// Known starting balance of seed account `seed_index`, if any.
    pub fn seed_starting_balance(&self, seed_index: usize) -> Option<Balance> {
        match self {
            Self::SeedPrefunded {
                starting_balance_kin,
                seed_count,
            } if seed_index < *seed_count => Some(Balance::from_kin(*starting_balance_kin)),
            _ => None,
        }
    }
}

/// Which ledger network is in use. Pure data, consulted at construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub network: NetworkId,
    pub node_endpoint: String,
    pub funding: FundingPolicy,
}

impl NetworkConfig {
    /// Local deterministic sandbox with pre-funded seed accounts.
    pub fn sandbox() -> Self {
        Self {
            network: NetworkId::Sandbox,
            node_endpoint: SANDBOX_NODE_ENDPOINT.to_string(),
            funding: FundingPolicy::SeedPrefunded {
                starting_balance_kin: SANDBOX_STARTING_BALANCE_KIN,
                seed_count: SANDBOX_SEED_COUNT,
            },
        }
    }

    /// Public test network funded through a faucet.
    pub fn testnet(node_endpoint: impl Into<String>, faucet_url: Option<String>) -> Self {
        Self {
            network: NetworkId::Testnet,
            node_endpoint: node_endpoint.into(),
            funding: FundingPolicy::ExternalFaucet { faucet_url },
        }
    }

    pub fn mainnet(node_endpoint: impl Into<String>) -> Self {
        Self {
            network: NetworkId::Mainnet,
            node_endpoint: node_endpoint.into(),
            funding: FundingPolicy::Unfunded,
        }
    }

    /// Reject combinations that would put public seed keys near real value.
    pub fn validate(&self) -> Result<(), KinError> {
        if self.network.is_production() && self.funding.allows_seed_accounts() {
            return Err(KinError::Config(
                "seed-prefunded funding is not allowed on mainnet".to_string(),
            ));
        }
        if let FundingPolicy::SeedPrefunded { seed_count, .. } = self.funding {
            if seed_count > SANDBOX_SEED_COUNT {
                return Err(KinError::Config(format!(
                    "seed_count {seed_count} exceeds the {SANDBOX_SEED_COUNT}-entry seed table"
                )));
            }
        }
        if self.node_endpoint.is_empty() {
            return Err(KinError::Config("node_endpoint must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Top-level configuration for a wallet process.
///
/// Load from TOML with [`WalletConfig::from_toml_file`] or build
/// programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Directory holding one encrypted key file per account.
    #[serde(default = "default_keystore_dir")]
    pub keystore_dir: PathBuf,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter, e.g. "info" or "debug,kin_wallet_core=trace".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Key derivation cost for newly written key files.
    #[serde(default)]
    pub kdf: KdfParams,

    #[serde(default = "NetworkConfig::sandbox")]
    pub network: NetworkConfig,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_keystore_dir() -> PathBuf {
    PathBuf::from("./kin_keystore")
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl WalletConfig {
    pub fn from_toml_file(path: &str) -> Result<Self, KinError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| KinError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, KinError> {
        let config: Self = toml::from_str(s).map_err(|e| KinError::Config(e.to_string()))?;
        config.network.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, KinError> {
        toml::to_string_pretty(self).map_err(|e| KinError::Config(e.to_string()))
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::sandbox(),
            keystore_dir: default_keystore_dir(),
            kdf: KdfParams::default(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}
