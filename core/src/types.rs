//! Typed values for addresses, keys and balances.
//!
//! The persisted and wire forms carry literal tags (`Wa` for addresses, `Wp`
//! for private keys, `Wb` for balances) in front of lowercase hex. Those tags
//! only exist at the serde boundary; everything in memory works on the typed
//! values below.

use crate::error::{LedgerError, Result};
use primitive_types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const ADDRESS_TAG: &str = "Wa";
pub const PRIVATE_KEY_TAG: &str = "Wp";
pub const BALANCE_TAG: &str = "Wb";

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Wallet address, stored as lowercase hex without its tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(String);

impl Address {
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        is_hex(hex).then(|| Address(hex.to_lowercase()))
    }

    /// Decode the tagged `Wa...` form.
    pub fn decode(tagged: &str) -> Option<Self> {
        tagged.strip_prefix(ADDRESS_TAG).and_then(Self::from_hex)
    }

    pub fn encode(&self) -> String {
        format!("{}{}", ADDRESS_TAG, self.0)
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Address(hex::encode(bytes))
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", ADDRESS_TAG, self.0)
    }
}

/// A string that does not decode can never match a wallet, so parsing
/// reports it as an unknown address.
impl FromStr for Address {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        Address::decode(s.trim()).ok_or_else(|| LedgerError::UnknownAddress(s.to_string()))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Address::decode(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("malformed address: {}", raw)))
    }
}

/// Wallet private key. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(String);

impl PrivateKey {
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        is_hex(hex).then(|| PrivateKey(hex.to_lowercase()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        PrivateKey(hex::encode(bytes))
    }

    pub fn decode(tagged: &str) -> Option<Self> {
        tagged.strip_prefix(PRIVATE_KEY_TAG).and_then(Self::from_hex)
    }

    pub fn encode(&self) -> String {
        format!("{}{}", PRIVATE_KEY_TAG, self.0)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

impl Serialize for PrivateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for PrivateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        PrivateKey::decode(&raw).ok_or_else(|| serde::de::Error::custom("malformed private key"))
    }
}

/// Unsigned 256-bit amount. All arithmetic is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Balance(U256);

impl Balance {
    pub fn zero() -> Self {
        Balance(U256::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(self, other: Balance) -> Option<Balance> {
        self.0.checked_add(other.0).map(Balance)
    }

    pub fn checked_sub(self, other: Balance) -> Option<Balance> {
        self.0.checked_sub(other.0).map(Balance)
    }

    /// Parse a user-supplied amount: decimal digits or `0x` hex.
    ///
    /// Signs, fractions and empty strings are rejected with `InvalidAmount`.
    pub fn parse_amount(input: &str) -> Result<Balance> {
        let s = input.trim();
        let invalid = || LedgerError::InvalidAmount(input.to_string());

        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            if !is_hex(hex) {
                return Err(invalid());
            }
            return U256::from_str_radix(hex, 16).map(Balance).map_err(|_| invalid());
        }

        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        U256::from_dec_str(s).map(Balance).map_err(|_| invalid())
    }

    /// `0x`-prefixed lowercase hex, as returned by `wcn_getBalance`.
    pub fn to_hex_string(&self) -> String {
        format!("0x{:x}", self.0)
    }

    pub fn decode(tagged: &str) -> Option<Self> {
        let hex = tagged.strip_prefix(BALANCE_TAG)?;
        if !is_hex(hex) {
            return None;
        }
        U256::from_str_radix(hex, 16).ok().map(Balance)
    }

    pub fn encode(&self) -> String {
        format!("{}{:x}", BALANCE_TAG, self.0)
    }
}

impl From<u64> for Balance {
    fn from(value: u64) -> Self {
        Balance(U256::from(value))
    }
}

impl From<U256> for Balance {
    fn from(value: U256) -> Self {
        Balance(value)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Balance {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Balance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Balance::decode(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("malformed balance: {}", raw)))
    }
}
