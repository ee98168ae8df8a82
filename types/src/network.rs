//! Network identifier.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies which ledger network a client talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    /// The production network.
    Mainnet,
    /// The public test network (faucet funded).
    Testnet,
    /// Local deterministic sandbox with pre-funded seed accounts.
    Sandbox,
}

impl NetworkId {
    /// Numeric chain identifier mixed into every signed transfer.
    pub fn chain_id(&self) -> u32 {
        match self {
            Self::Mainnet => 1,
            Self::Testnet => 3,
            Self::Sandbox => 9,
        }
    }

    /// Human-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Sandbox => "sandbox",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Mainnet)
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
