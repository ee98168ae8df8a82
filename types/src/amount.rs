//! Exact token balances.
//!
//! Balances are fixed-point integers (u128) counted in quarks, the smallest
//! ledger unit. One whole token is `10^DECIMALS` quarks. Nothing in this type
//! goes through floating point.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

use crate::error::TypeError;

/// A token balance, stored as raw quarks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Balance(u128);

impl Balance {
    pub const ZERO: Self = Self(0);

    /// Decimal places of one whole token.
    pub const DECIMALS: u32 = 18;

    /// Quarks per whole token.
    pub const QUARKS_PER_KIN: u128 = 10u128.pow(Self::DECIMALS);

    pub fn from_quarks(quarks: u128) -> Self {
        Self(quarks)
    }

    /// A balance of exactly `kin` whole tokens.
    pub fn from_kin(kin: u64) -> Self {
        // u64::MAX * 10^18 < u128::MAX, so this cannot overflow.
        Self(kin as u128 * Self::QUARKS_PER_KIN)
    }

    pub fn quarks(&self) -> u128 {
        self.0
    }

    /// The whole-token part, discarding any fraction.
    pub fn whole_kin(&self) -> u128 {
        self.0 / Self::QUARKS_PER_KIN
    }

    /// The fractional part in quarks.
    pub fn fractional_quarks(&self) -> u128 {
        self.0 % Self::QUARKS_PER_KIN
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl Add for Balance {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Balance {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.whole_kin();
        let frac = self.fractional_quarks();
        if frac == 0 {
            return write!(f, "{whole}");
        }
        let digits = format!("{:0width$}", frac, width = Self::DECIMALS as usize);
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

impl FromStr for Balance {
    type Err = TypeError;

    /// Parse an exact decimal string such as `"1000"` or `"12.5"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TypeError::InvalidAmount(s.to_string());

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if s.contains('.') && frac.is_empty() {
            return Err(invalid());
        }
        if frac.len() > Self::DECIMALS as usize || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let whole: u128 = whole.parse().map_err(|_| invalid())?;
        let frac_quarks: u128 = if frac.is_empty() {
            0
        } else {
            let scale = 10u128.pow(Self::DECIMALS - frac.len() as u32);
            frac.parse::<u128>().map_err(|_| invalid())? * scale
        };

        whole
            .checked_mul(Self::QUARKS_PER_KIN)
            .and_then(|q| q.checked_add(frac_quarks))
            .map(Self)
            .ok_or_else(invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_kin_scales_by_decimals() {
        assert_eq!(Balance::from_kin(5).quarks(), 5 * 10u128.pow(18));
        assert_eq!(Balance::from_kin(0), Balance::ZERO);
    }

    #[test]
    fn display_whole_and_fraction() {
        assert_eq!(Balance::from_kin(1000).to_string(), "1000");
        assert_eq!(Balance::ZERO.to_string(), "0");
        let half = Balance::from_quarks(Balance::QUARKS_PER_KIN / 2);
        assert_eq!((Balance::from_kin(12) + half).to_string(), "12.5");
        assert_eq!(Balance::from_quarks(1).to_string(), "0.000000000000000001");
    }

    #[test]
    fn parse_exact_decimals() {
        assert_eq!("1000".parse::<Balance>().unwrap(), Balance::from_kin(1000));
        assert_eq!(
            "0.000000000000000001".parse::<Balance>().unwrap(),
            Balance::from_quarks(1)
        );
        assert_eq!(
            "12.5".parse::<Balance>().unwrap(),
            Balance::from_kin(12) + Balance::from_quarks(Balance::QUARKS_PER_KIN / 2)
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        for bad in ["", ".", "1.", ".5", "-1", "1e3", "1.0000000000000000001", "abc", "1,5"] {
            assert!(bad.parse::<Balance>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn parse_rejects_overflow() {
        let too_big = format!("{}", u128::MAX);
        assert!(too_big.parse::<Balance>().is_err());
    }

    #[test]
    fn subtraction_is_exact() {
        let start = Balance::from_kin(1000);
        let after = start.checked_sub(Balance::from_kin(5)).unwrap();
        assert_eq!(after, Balance::from_kin(995));
        assert_eq!(Balance::from_kin(4).checked_sub(Balance::from_kin(5)), None);
        assert_eq!(
            Balance::from_kin(4).saturating_sub(Balance::from_kin(5)),
            Balance::ZERO
        );
    }
}
