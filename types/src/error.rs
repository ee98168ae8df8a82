//! Parse errors for the value types in this crate.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("address checksum mismatch: {0}")]
    AddressChecksum(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid transaction handle: {0}")]
    InvalidHandle(String),
}
