//! Fundamental types for the Kin wallet core.
//!
//! This crate defines the value types shared by every other crate in the
//! workspace: addresses, balances, transaction handles and statuses, network
//! identifiers, and raw key material.

pub mod address;
pub mod amount;
pub mod error;
pub mod hash;
pub mod keys;
pub mod network;
pub mod status;

pub use address::Address;
pub use amount::Balance;
pub use error::TypeError;
pub use hash::TxHandle;
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use network::NetworkId;
pub use status::TxStatus;
