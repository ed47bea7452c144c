//! Byte/word order of 32-bit values split over two registers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order of the four bytes of a 32-bit value across two registers
///
/// Uses ABCD notation where A is the most significant byte. For `0x12345678`:
/// - `BigEndian (ABCD)`: regs `[0x1234, 0x5678]` (high word first)
/// - `LittleEndian (DCBA)`: regs `[0x7856, 0x3412]`
/// - `BigEndianSwap (CDAB)`: regs `[0x5678, 0x1234]` (low word first)
/// - `LittleEndianSwap (BADC)`: regs `[0x3412, 0x7856]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ByteOrder {
    /// ABCD, high word first
    #[default]
    #[serde(rename = "ABCD", alias = "high_word_first", alias = "big_endian")]
    BigEndian,

    /// DCBA
    #[serde(rename = "DCBA", alias = "little_endian")]
    LittleEndian,

    /// CDAB, low word first (common on PLCs)
    #[serde(rename = "CDAB", alias = "low_word_first", alias = "big_endian_swap")]
    BigEndianSwap,

    /// BADC
    #[serde(rename = "BADC", alias = "little_endian_swap")]
    LittleEndianSwap,
}

impl ByteOrder {
    /// ABCD-style name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BigEndian => "ABCD",
            Self::LittleEndian => "DCBA",
            Self::BigEndianSwap => "CDAB",
            Self::LittleEndianSwap => "BADC",
        }
    }

    /// Check if words are swapped relative to their natural order
    pub fn has_word_swap(&self) -> bool {
        matches!(self, Self::BigEndianSwap | Self::LittleEndianSwap)
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ByteOrder {
    type Err = String;

    /// Accepts "ABCD", "AB-CD", "BE", "CDAB" and the like
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace('-', "");
        match normalized.as_str() {
            "ABCD" | "BE" | "BIG_ENDIAN" | "HIGH_WORD_FIRST" => Ok(Self::BigEndian),
            "DCBA" | "LE" | "LITTLE_ENDIAN" => Ok(Self::LittleEndian),
            "CDAB" | "BIG_ENDIAN_SWAP" | "LOW_WORD_FIRST" => Ok(Self::BigEndianSwap),
            "BADC" | "LITTLE_ENDIAN_SWAP" => Ok(Self::LittleEndianSwap),
            _ => Err(format!("unknown byte order '{}'", s)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_from_str_valid() {
        assert_eq!("ABCD".parse::<ByteOrder>().unwrap(), ByteOrder::BigEndian);
        assert_eq!("ab-cd".parse::<ByteOrder>().unwrap(), ByteOrder::BigEndian);
        assert_eq!("DCBA".parse::<ByteOrder>().unwrap(), ByteOrder::LittleEndian);
        assert_eq!("CDAB".parse::<ByteOrder>().unwrap(), ByteOrder::BigEndianSwap);
        assert_eq!(
            "low_word_first".parse::<ByteOrder>().unwrap(),
            ByteOrder::BigEndianSwap
        );
        assert_eq!(
            "BADC".parse::<ByteOrder>().unwrap(),
            ByteOrder::LittleEndianSwap
        );
    }

    #[test]
    fn test_from_str_invalid() {
        assert!("AB".parse::<ByteOrder>().is_err());
        assert!("".parse::<ByteOrder>().is_err());
    }

    #[test]
    fn test_deserialize_names_and_aliases() {
        let order: ByteOrder = serde_yaml::from_str("CDAB").unwrap();
        assert_eq!(order, ByteOrder::BigEndianSwap);
        let order: ByteOrder = serde_yaml::from_str("high_word_first").unwrap();
        assert_eq!(order, ByteOrder::BigEndian);
    }

    #[test]
    fn test_default_is_high_word_first() {
        assert_eq!(ByteOrder::default(), ByteOrder::BigEndian);
        assert!(!ByteOrder::default().has_word_swap());
    }
}
