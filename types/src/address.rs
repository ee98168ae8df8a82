//! Account address type with `0x` prefix and mixed-case checksum.
//!
//! Text form: `0x` + 40 hex digits. A hex letter is upper-case when the
//! matching nibble of Blake2b-256(lower-case hex body) is >= 8, so a single
//! mistyped character is caught when the address is parsed.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::TypeError;

type Blake2b256 = Blake2b<U32>;

/// A ledger account address (20 raw bytes).
///
/// Derived from the account's public key with `kin_crypto::derive_address`.
/// Equality and hashing are on the raw bytes, never on the text form.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; 20]);

impl Address {
    /// The prefix of every textual address.
    pub const PREFIX: &'static str = "0x";
    /// Number of raw bytes in an address.
    pub const LEN: usize = 20;

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Render the checksummed text form.
    pub fn to_checksum_string(&self) -> String {
        let lower = hex::encode(self.0);
        let digest = Blake2b256::digest(lower.as_bytes());

        let mut out = String::with_capacity(Self::PREFIX.len() + lower.len());
        out.push_str(Self::PREFIX);
        for (i, c) in lower.chars().enumerate() {
            let byte = digest[i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Parse an address from text.
    ///
    /// All-lower-case and all-upper-case bodies are accepted without checksum
    /// verification; mixed case must match the checksum exactly.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let body = s
            .strip_prefix(Self::PREFIX)
            .ok_or_else(|| TypeError::InvalidAddress(s.to_string()))?;
        if body.len() != Self::LEN * 2 || !body.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidAddress(s.to_string()));
        }

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(body, &mut bytes)
            .map_err(|_| TypeError::InvalidAddress(s.to_string()))?;
        let address = Self(bytes);

        let has_lower = body.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = body.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper && address.to_checksum_string() != s {
            return Err(TypeError::AddressChecksum(s.to_string()));
        }
        Ok(address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum_string())
    }
}

impl FromStr for Address {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
