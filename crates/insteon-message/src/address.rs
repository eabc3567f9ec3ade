//! Device and group addresses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::ADDRESS_SIZE;
use crate::error::FormatError;

/// A 3-byte Insteon address.
///
/// Devices have unique addresses. Group broadcasts use the reserved form
/// `00.00.gg` where `gg` is the group number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; ADDRESS_SIZE]);

impl Address {
    /// Create an address from its three components.
    pub const fn new(high: u8, middle: u8, low: u8) -> Self {
        Address([high, middle, low])
    }

    /// Address of a broadcast group.
    pub const fn group(group: u8) -> Self {
        Address([0x00, 0x00, group])
    }

    /// Create from a slice. Returns None if the slice is too short.
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() < ADDRESS_SIZE {
            return None;
        }
        let mut bytes = [0u8; ADDRESS_SIZE];
        bytes.copy_from_slice(&slice[..ADDRESS_SIZE]);
        Some(Address(bytes))
    }

    /// Get the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    /// Canonical lowercase hex form, e.g. `"0a1b2c"`.
    pub fn hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Group number if this is a group address.
    pub fn as_group(&self) -> Option<u8> {
        match self.0 {
            [0x00, 0x00, group] => Some(group),
            _ => None,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}.{:02x}.{:02x}", self.0[0], self.0[1], self.0[2])
    }
}

impl FromStr for Address {
    type Err = FormatError;

    /// Accepts `"0a.1b.2c"`, `"0a:1b:2c"`, `"0a 1b 2c"` and `"0a1b2c"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '.' | ':' | ' '))
            .collect();
        if digits.len() != ADDRESS_SIZE * 2 {
            return Err(FormatError::invalid_address(s));
        }
        let bytes = hex::decode(&digits).map_err(|_| FormatError::invalid_address(s))?;
        Address::from_slice(&bytes).ok_or_else(|| FormatError::invalid_address(s))
    }
}

impl From<[u8; ADDRESS_SIZE]> for Address {
    fn from(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Address(bytes)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forms() {
        let addr = Address::new(0x0A, 0x1B, 0x2C);
        assert_eq!(addr.hex(), "0a1b2c");
        assert_eq!(addr.to_string(), "0a.1b.2c");
    }

    #[test]
    fn test_parse_variants() {
        let expected = Address::new(0x44, 0xA3, 0x79);
        for text in ["44.a3.79", "44:A3:79", "44 a3 79", "44a379", " 44.A3.79 "] {
            assert_eq!(text.parse::<Address>().unwrap(), expected, "{text}");
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("44.a3".parse::<Address>().is_err());
        assert!("zz.a3.79".parse::<Address>().is_err());
        assert!("44.a3.79.01".parse::<Address>().is_err());
    }

    #[test]
    fn test_group() {
        assert_eq!(Address::group(3).as_group(), Some(3));
        assert_eq!(Address::new(1, 2, 3).as_group(), None);
    }

    #[test]
    fn test_serde_uses_human_form() {
        let addr = Address::new(1, 2, 3);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"01.02.03\"");
        let back: Address = serde_json::from_str("\"010203\"").unwrap();
        assert_eq!(back, addr);
    }
}
