//! The ledger-node collaborator.

use kin_types::{Address, Balance, TxHandle, TxStatus};

use crate::error::KinError;
use crate::transfer::SignedTransfer;

/// Balance, broadcast, and status primitives of a ledger node.
///
/// Each call is one request; implementations must not retry internally.
/// Transport failures and timeouts surface as [`KinError::Network`],
/// undecodable answers as [`KinError::Decoding`].
pub trait LedgerGateway: Send + Sync {
    /// Confirmed on-chain balance. An address the ledger has never seen
    /// resolves to zero.
    fn balance(&self, address: &Address) -> Result<Balance, KinError>;

    /// Confirmed balance adjusted by every transfer to or from `address`
    /// that is still pending network-wide, not only those this client sent.
    fn pending_balance(&self, address: &Address) -> Result<Balance, KinError>;

    fn broadcast(&self, transfer: &SignedTransfer) -> Result<TxHandle, KinError>;

    fn status(&self, handle: &TxHandle) -> Result<TxStatus, KinError>;
}

impl<G: LedgerGateway + ?Sized> LedgerGateway for std::sync::Arc<G> {
    fn balance(&self, address: &Address) -> Result<Balance, KinError> {
        (**self).balance(address)
    }

    fn pending_balance(&self, address: &Address) -> Result<Balance, KinError> {
        (**self).pending_balance(address)
    }

    fn broadcast(&self, transfer: &SignedTransfer) -> Result<TxHandle, KinError> {
        (**self).broadcast(transfer)
    }

    fn status(&self, handle: &TxHandle) -> Result<TxStatus, KinError> {
        (**self).status(handle)
    }
}
