//! 32-byte ledger account addresses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

const LENGTH: usize = 32;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AccountAddress([u8; LENGTH]);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid account address {0:?}")]
pub struct AddressParseError(String);

impl AccountAddress {
    /// The all-zero address, used by the ledger to mean "nobody".
    pub const ZERO: Self = Self([0u8; LENGTH]);

    pub const fn new(bytes: [u8; LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; LENGTH]
    }

    pub fn to_hex_literal(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// `0x1234...abcd`, or "No one" for the zero address.
    pub fn shorten(&self) -> String {
        if self.is_zero() {
            return "No one".to_string();
        }
        let full = self.to_hex_literal();
        format!("{}...{}", &full[..6], &full[full.len() - 4..])
    }
}

impl FromStr for AccountAddress {
    type Err = AddressParseError;

    /// Accepts `0x`-prefixed or bare hex, short forms (`0x1`) included.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if digits.is_empty() || digits.len() > LENGTH * 2 {
            return Err(AddressParseError(s.to_string()));
        }
        let padded = format!("{digits:0>width$}", width = LENGTH * 2);
        let mut bytes = [0u8; LENGTH];
        hex::decode_to_slice(&padded, &mut bytes).map_err(|_| AddressParseError(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex_literal())
    }
}

impl fmt::Debug for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountAddress({})", self.to_hex_literal())
    }
}

impl Serialize for AccountAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex_literal())
    }
}

impl<'de> Deserialize<'de> for AccountAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_long_forms() {
        let one: AccountAddress = "0x1".parse().unwrap();
        assert_eq!(
            one.to_hex_literal(),
            "0x0000000000000000000000000000000000000000000000000000000000000001"
        );

        let long: AccountAddress = "0x110c0e6e7192bcc4cb6b4e1dcda49d1366c44f3f0cf17e18e1cec5b93aa0ea79"
            .parse()
            .unwrap();
        assert_eq!(
            long.to_string(),
            "0x110c0e6e7192bcc4cb6b4e1dcda49d1366c44f3f0cf17e18e1cec5b93aa0ea79"
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!("0x".parse::<AccountAddress>().is_err());
        assert!("0xzz".parse::<AccountAddress>().is_err());
        assert!(format!("0x{}", "a".repeat(65)).parse::<AccountAddress>().is_err());
    }

    #[test]
    fn mixed_case_is_normalised() {
        let upper: AccountAddress = "0xABCDEF".parse().unwrap();
        let lower: AccountAddress = "0xabcdef".parse().unwrap();
        assert_eq!(upper, lower);
    }

    #[test]
    fn shorten_keeps_prefix_and_suffix() {
        let addr: AccountAddress = "0x110c0e6e7192bcc4cb6b4e1dcda49d1366c44f3f0cf17e18e1cec5b93aa0ea79"
            .parse()
            .unwrap();
        assert_eq!(addr.shorten(), "0x110c...ea79");
        assert_eq!(AccountAddress::ZERO.shorten(), "No one");
    }

    #[test]
    fn serde_uses_hex_literal() {
        let addr: AccountAddress = "0x2".parse().unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(
            json,
            "\"0x0000000000000000000000000000000000000000000000000000000000000002\""
        );
        let back: AccountAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
