//! Core type definitions shared by every Delta component

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Raw token amount in the smallest unit of its asset
pub type Amount = u128;

/// Account or contract identity
///
/// Contract addresses are derived from a human readable label with BLAKE3 so
/// that a deployment is reproducible from its configuration alone.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address {
    bytes: [u8; 32],
}

impl Address {
    /// The zero address, never a valid participant
    pub const ZERO: Self = Self { bytes: [0u8; 32] };

    /// Create an address from raw bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Derive an address from a label, e.g. `"earning-pool/USDC"`
    pub fn from_label(label: &str) -> Self {
        let hash = blake3::hash(label.as_bytes());
        Self {
            bytes: *hash.as_bytes(),
        }
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    pub fn is_zero(&self) -> bool {
        self.bytes == [0u8; 32]
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Parse from a hex string, with or without a `0x` prefix
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self { bytes })
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", &self.to_hex()[..12])
    }
}

impl FromStr for Address {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", self.to_hex()))
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde helpers for amounts that exceed the range of JSON/TOML integers.
///
/// Amounts are written as decimal strings; plain integers are accepted on input.
pub mod amount_string {
    use super::Amount;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(u64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(s) => s
                .replace('_', "")
                .parse::<Amount>()
                .map_err(|e| de::Error::custom(format!("invalid amount {s:?}: {e}"))),
            Repr::Number(n) => Ok(n as Amount),
        }
    }
}
