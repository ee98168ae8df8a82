//! Transaction handle returned by a broadcast.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TypeError;

/// A 32-byte transaction hash identifying a submitted transfer.
///
/// Used to poll the transfer's [`TxStatus`](crate::TxStatus).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHandle([u8; 32]);

impl TxHandle {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHandle({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for TxHandle {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(body, &mut bytes)
            .map_err(|_| TypeError::InvalidHandle(s.to_string()))?;
        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_parses_back() {
        let handle = TxHandle::new([0xab; 32]);
        let text = handle.to_string();
        assert!(text.starts_with("0xabab"));
        assert_eq!(text.parse::<TxHandle>().unwrap(), handle);
    }

    #[test]
    fn parse_without_prefix() {
        let hex_body = "11".repeat(32);
        assert_eq!(hex_body.parse::<TxHandle>().unwrap(), TxHandle::new([0x11; 32]));
    }

    #[test]
    fn parse_rejects_short_input() {
        assert!("0x1234".parse::<TxHandle>().is_err());
    }
}
