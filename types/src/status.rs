//! Transaction status as reported by the ledger.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a submitted transfer.
///
/// Moves from `Pending` to exactly one of `Confirmed` or `Failed` and never
/// back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

impl TxStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Combine a previously observed status with a newer observation.
    ///
    /// A terminal status is sticky: a later `Pending` report (for example from
    /// a lagging node) does not undo it.
    pub fn merge(self, observed: TxStatus) -> TxStatus {
        if self.is_terminal() {
            self
        } else {
            observed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
