use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseAddressError {
    #[error("address is empty")]
    Empty,
    #[error("address must start with 0x: '{0}'")]
    MissingPrefix(String),
    #[error("address must have 40 hex digits, got {0}")]
    BadLength(usize),
    #[error("address contains non-hex characters: '{0}'")]
    NotHex(String),
}

/// 20-byte account or contract identifier.
///
/// Parsing accepts any hex case (checksummed or not); equality is on bytes, so
/// two spellings of the same address compare equal. Display is lowercase.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Left-pad to a 32-byte log topic, `0x` prefixed
    pub fn to_topic(&self) -> String {
        format!("0x{}{}", "0".repeat(24), hex::encode(self.0))
    }

    /// Read the address out of the low 20 bytes of a 32-byte ABI word
    pub fn from_word(word: &[u8]) -> Option<Self> {
        if word.len() != 32 {
            return None;
        }
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&word[12..]);
        Some(Self(bytes))
    }
}

impl FromStr for Address {
    type Err = ParseAddressError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ParseAddressError::Empty);
        }

        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| ParseAddressError::MissingPrefix(trimmed.to_string()))?;

        if digits.len() != 40 {
            return Err(ParseAddressError::BadLength(digits.len()));
        }

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|_| ParseAddressError::NotHex(trimmed.to_string()))?;

        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
