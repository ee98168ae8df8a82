//! Transfer construction and signing.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use kin_crypto::{derive_address, hash_transfer, verify_signature};
use kin_types::{Address, Balance, NetworkId, PublicKey, Signature, TxHandle};

use crate::error::KinError;
use crate::keystore::UnlockedKey;

/// An unsigned value transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// Chain identifier of the target network (replay protection).
    pub chain_id: u32,
    pub from: Address,
    pub to: Address,
    pub amount: Balance,
    /// Random per-transfer value so identical transfers get distinct handles.
    pub nonce: u64,
}

impl Transfer {
    /// A transfer of exactly `kin` whole tokens.
    pub fn new(network: NetworkId, from: Address, to: Address, kin: u64) -> Self {
        Self {
            chain_id: network.chain_id(),
            from,
            to,
            amount: Balance::from_kin(kin),
            nonce: rand::thread_rng().next_u64(),
        }
    }

    /// Canonical byte encoding that is hashed and signed.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, KinError> {
        bincode::serialize(self)
            .map_err(|e| KinError::Other(format!("transfer encoding failed: {e}")))
    }

    pub fn handle(&self) -> Result<TxHandle, KinError> {
        Ok(hash_transfer(&self.signing_bytes()?))
    }

    /// Sign with a key unlocked for this operation.
    pub fn sign(self, key: &UnlockedKey) -> Result<SignedTransfer, KinError> {
        let public_key = key.public_key();
        if derive_address(&public_key) != self.from {
            return Err(KinError::Other(format!(
                "signing key does not belong to sender {}",
                self.from
            )));
        }
        let bytes = self.signing_bytes()?;
        let handle = hash_transfer(&bytes);
        let signature = key.sign(handle.as_bytes());
        Ok(SignedTransfer {
            transfer: self,
            public_key,
            signature,
            handle,
        })
    }
}

/// A transfer ready for broadcast.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransfer {
    pub transfer: Transfer,
    pub public_key: PublicKey,
    /// Signature over the handle bytes.
    pub signature: Signature,
    pub handle: TxHandle,
}

impl SignedTransfer {
    /// Check the handle, the sender binding, and the signature.
    pub fn verify(&self) -> bool {
        let Ok(handle) = self.transfer.handle() else {
            return false;
        };
        handle == self.handle
            && derive_address(&self.public_key) == self.transfer.from
            && verify_signature(self.handle.as_bytes(), &self.signature, &self.public_key)
    }

    /// Hex encoding of the full signed transfer for raw submission.
    pub fn to_raw_hex(&self) -> Result<String, KinError> {
        bincode::serialize(self)
            .map(hex::encode)
            .map_err(|e| KinError::Other(format!("transfer encoding failed: {e}")))
    }
}
