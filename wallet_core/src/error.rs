use kin_types::{Balance, NetworkId, TypeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KinError {
    /// The passphrase could not decrypt the stored key.
    #[error("authentication failed: passphrase does not unlock account {index}")]
    Authentication { index: u32 },

    /// Client-side pre-flight check: the transfer exceeds the confirmed balance.
    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Balance, available: Balance },

    /// The key for this account index has been erased.
    #[error("account {0} has been deleted")]
    AccountDeleted(u32),

    /// Malformed or unknown address input. Never raised for a valid,
    /// unfunded address.
    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// Transport, timeout, or node-side failure. Safe to retry at the
    /// caller's discretion.
    #[error("network error: {0}")]
    Network(String),

    /// The node answered with something we could not decode.
    #[error("decoding error: {0}")]
    Decoding(String),

    /// Seed-derived keys requested on a network that does not allow them.
    #[error("seed-derived accounts are not allowed on the {network} network")]
    SeedNotAllowed { network: NetworkId },

    /// Key storage or key encryption failure.
    #[error("keystore error: {0}")]
    Keystore(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl KinError {
    /// Whether resubmitting the same request could succeed.
    ///
    /// Only network failures qualify; validation failures never succeed as
    /// requested.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<TypeError> for KinError {
    fn from(e: TypeError) -> Self {
        match e {
            TypeError::InvalidAddress(s) | TypeError::AddressChecksum(s) => {
                Self::AccountNotFound(s)
            }
            other => Self::Decoding(other.to_string()),
        }
    }
}
