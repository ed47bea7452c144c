//! Typed step property values
//!
//! A property carries its declared type next to the value so that parsing,
//! formatting and register width are all driven by the declaration rather
//! than by the value that happens to be stored.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ModelError, Result};

/// Maximum length (in chars) of a string property
pub const MAX_STRING_LEN: usize = 64;

/// Declared property type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Int16,
    Float32,
    String,
    Bool,
}

impl PropertyType {
    /// Stable identifier used in configuration and fingerprints
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int16 => "int16",
            Self::Float32 => "float32",
            Self::String => "string",
            Self::Bool => "bool",
        }
    }

    /// Whether values of this type fit a single 16-bit register
    pub fn fits_int_register(&self) -> bool {
        matches!(self, Self::Int16 | Self::Bool)
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int16" | "i16" | "int" => Ok(Self::Int16),
            "float32" | "f32" | "float" | "real" => Ok(Self::Float32),
            "string" | "str" => Ok(Self::String),
            "bool" | "boolean" => Ok(Self::Bool),
            other => Err(ModelError::Parse {
                expected: Self::String,
                text: other.to_string(),
                reason: "unknown property type".to_string(),
            }),
        }
    }
}

/// Raw property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Int16(i16),
    Float32(f32),
    String(String),
    Bool(bool),
}

impl PropertyValue {
    /// Type of the stored value
    pub fn kind(&self) -> PropertyType {
        match self {
            Self::Int16(_) => PropertyType::Int16,
            Self::Float32(_) => PropertyType::Float32,
            Self::String(_) => PropertyType::String,
            Self::Bool(_) => PropertyType::Bool,
        }
    }
}

/// A typed value plus the identifier of its declared type
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    kind: PropertyType,
    value: PropertyValue,
}

impl Property {
    /// Create a property, checking the value against the declared type
    pub fn new(kind: PropertyType, value: PropertyValue) -> Result<Self> {
        if value.kind() != kind {
            return Err(ModelError::TypeMismatch {
                expected: kind,
                actual: value.kind(),
            });
        }
        if let PropertyValue::String(s) = &value {
            let len = s.chars().count();
            if len > MAX_STRING_LEN {
                return Err(ModelError::StringTooLong {
                    len,
                    max: MAX_STRING_LEN,
                });
            }
        }
        Ok(Self { kind, value })
    }

    pub fn int16(value: i16) -> Self {
        Self {
            kind: PropertyType::Int16,
            value: PropertyValue::Int16(value),
        }
    }

    pub fn float32(value: f32) -> Self {
        Self {
            kind: PropertyType::Float32,
            value: PropertyValue::Float32(value),
        }
    }

    pub fn boolean(value: bool) -> Self {
        Self {
            kind: PropertyType::Bool,
            value: PropertyValue::Bool(value),
        }
    }

    pub fn string(value: impl Into<String>) -> Result<Self> {
        Self::new(PropertyType::String, PropertyValue::String(value.into()))
    }

    /// Declared type
    pub fn kind(&self) -> PropertyType {
        self.kind
    }

    pub fn value(&self) -> &PropertyValue {
        &self.value
    }

    /// Parse text as the declared type
    ///
    /// Floats must be finite and use `.` as decimal point. Booleans accept
    /// `true`/`false` and `1`/`0`.
    pub fn parse(kind: PropertyType, text: &str) -> Result<Self> {
        let parse_err = |reason: String| ModelError::Parse {
            expected: kind,
            text: text.to_string(),
            reason,
        };

        match kind {
            PropertyType::Int16 => text
                .trim()
                .parse::<i16>()
                .map(Self::int16)
                .map_err(|e| parse_err(e.to_string())),
            PropertyType::Float32 => {
                let value = text
                    .trim()
                    .parse::<f32>()
                    .map_err(|e| parse_err(e.to_string()))?;
                if !value.is_finite() {
                    return Err(parse_err("value is not finite".to_string()));
                }
                Ok(Self::float32(value))
            },
            PropertyType::Bool => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Self::boolean(true)),
                "false" | "0" => Ok(Self::boolean(false)),
                _ => Err(parse_err("expected true/false".to_string())),
            },
            PropertyType::String => Self::string(text),
        }
    }

    /// Canonical text form, the inverse of [`Property::parse`]
    pub fn format(&self) -> String {
        match &self.value {
            PropertyValue::Int16(v) => itoa::Buffer::new().format(*v).to_string(),
            PropertyValue::Float32(v) => ryu::Buffer::new().format(*v).to_string(),
            PropertyValue::String(s) => s.clone(),
            PropertyValue::Bool(b) => if *b { "true" } else { "false" }.to_string(),
        }
    }

    /// Numeric view, used for iteration counts and durations
    pub fn as_f64(&self) -> Option<f64> {
        match &self.value {
            PropertyValue::Int16(v) => Some(f64::from(*v)),
            PropertyValue::Float32(v) => Some(f64::from(*v)),
            PropertyValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            PropertyValue::String(_) => None,
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_mismatched_type() {
        let err = Property::new(PropertyType::Int16, PropertyValue::Float32(1.0)).unwrap_err();
        assert_eq!(
            err,
            ModelError::TypeMismatch {
                expected: PropertyType::Int16,
                actual: PropertyType::Float32,
            }
        );
    }

    #[test]
    fn test_string_length_limit() {
        assert!(Property::string("x".repeat(MAX_STRING_LEN)).is_ok());
        assert!(matches!(
            Property::string("x".repeat(MAX_STRING_LEN + 1)),
            Err(ModelError::StringTooLong { .. })
        ));
    }

    #[test]
    fn test_float_format_is_invariant_and_reparses() {
        for value in [0.1f32, 2.5, -3.75, 1.0, 1e-7, 123456.79] {
            let text = Property::float32(value).format();
            assert!(!text.contains(','));
            let back = Property::parse(PropertyType::Float32, &text).unwrap();
            assert_eq!(back, Property::float32(value));
        }
    }

    #[test]
    fn test_parse_int_and_bool() {
        assert_eq!(
            Property::parse(PropertyType::Int16, " -12 ").unwrap(),
            Property::int16(-12)
        );
        assert!(Property::parse(PropertyType::Int16, "40000").is_err());
        assert_eq!(
            Property::parse(PropertyType::Bool, "1").unwrap(),
            Property::boolean(true)
        );
        assert_eq!(Property::boolean(false).format(), "false");
        assert!(Property::parse(PropertyType::Bool, "yes").is_err());
    }

    #[test]
    fn test_parse_rejects_non_finite_float() {
        assert!(Property::parse(PropertyType::Float32, "NaN").is_err());
        assert!(Property::parse(PropertyType::Float32, "inf").is_err());
        assert!(Property::parse(PropertyType::Float32, "1,5").is_err());
    }

    #[test]
    fn test_property_type_from_str() {
        assert_eq!("F32".parse::<PropertyType>().unwrap(), PropertyType::Float32);
        assert_eq!("boolean".parse::<PropertyType>().unwrap(), PropertyType::Bool);
        assert!("double".parse::<PropertyType>().is_err());
    }

    #[test]
    fn test_as_f64() {
        assert_eq!(Property::int16(3).as_f64(), Some(3.0));
        assert_eq!(Property::float32(2.5).as_f64(), Some(2.5));
        assert_eq!(Property::string("a").unwrap().as_f64(), None);
    }
}
