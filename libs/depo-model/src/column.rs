//! Column definitions and the immutable column schema

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use crate::error::{ModelError, Result};
use crate::property::PropertyType;

/// Key of the column holding the step's action id
pub const ACTION_COLUMN: &str = "action";
/// Key of the column holding a long-lasting step's duration (seconds)
pub const DURATION_COLUMN: &str = "duration";
/// Key of the column holding a loop's iteration count
pub const ITERATIONS_COLUMN: &str = "iterations";

/// Stable column identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnKey(String);

impl ColumnKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ColumnKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ColumnKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// PLC register area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PlcArea {
    Int,
    Float,
}

impl PlcArea {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "Int",
            Self::Float => "Float",
        }
    }
}

impl fmt::Display for PlcArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a column's value lives within one recipe row on the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlcMapping {
    pub area: PlcArea,
    /// Zero-based index within the area for one row
    pub index: u16,
}

/// Column declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub key: ColumnKey,
    /// Display code, also the header name in recipe files
    pub code: String,
    pub ordinal: u16,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    /// Read-only columns are computed and never round-tripped to PLC or file
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub plc: Option<PlcMapping>,
}

impl ColumnDefinition {
    pub fn new(key: &str, code: &str, ordinal: u16, property_type: PropertyType) -> Self {
        Self {
            key: ColumnKey::from(key),
            code: code.to_string(),
            ordinal,
            property_type,
            read_only: false,
            plc: None,
        }
    }

    pub fn mapped(mut self, area: PlcArea, index: u16) -> Self {
        self.plc = Some(PlcMapping { area, index });
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Persisted to files and the controller
    pub fn is_persisted(&self) -> bool {
        !self.read_only
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_lowercase()
}

/// Ordered, immutable set of column definitions
#[derive(Debug, Clone)]
pub struct ColumnSchema {
    columns: Vec<ColumnDefinition>,
    by_key: AHashMap<ColumnKey, usize>,
    by_code: AHashMap<String, usize>,
}

impl ColumnSchema {
    /// Build the schema, ordering columns by ordinal
    pub fn new(mut columns: Vec<ColumnDefinition>) -> Result<Self> {
        columns.sort_by_key(|c| c.ordinal);

        let mut by_key = AHashMap::with_capacity(columns.len());
        let mut by_code = AHashMap::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            if by_key.insert(column.key.clone(), i).is_some() {
                return Err(ModelError::DuplicateColumn(column.key.to_string()));
            }
            if by_code.insert(normalize_code(&column.code), i).is_some() {
                return Err(ModelError::DuplicateCode(column.code.clone()));
            }
            if i > 0 && columns[i - 1].ordinal == column.ordinal {
                return Err(ModelError::DuplicateOrdinal {
                    ordinal: column.ordinal,
                    first: columns[i - 1].key.to_string(),
                    second: column.key.to_string(),
                });
            }
        }

        let schema = Self {
            columns,
            by_key,
            by_code,
        };
        schema.check_well_known_columns()?;
        Ok(schema)
    }

    fn check_well_known_columns(&self) -> Result<()> {
        let action = self
            .get(ACTION_COLUMN)
            .ok_or_else(|| ModelError::MissingActionColumn(ACTION_COLUMN.to_string()))?;
        if action.property_type != PropertyType::Int16 || action.read_only {
            return Err(ModelError::InvalidColumn {
                key: ACTION_COLUMN.to_string(),
                reason: "must be a writable int16 column".to_string(),
            });
        }

        for key in [DURATION_COLUMN, ITERATIONS_COLUMN] {
            if let Some(column) = self.get(key) {
                if !matches!(
                    column.property_type,
                    PropertyType::Int16 | PropertyType::Float32
                ) {
                    return Err(ModelError::InvalidColumn {
                        key: key.to_string(),
                        reason: format!("must be numeric, got {}", column.property_type),
                    });
                }
            }
        }
        Ok(())
    }

    /// All columns in ordinal order
    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// Columns that are round-tripped to files and the controller, in ordinal order
    pub fn persisted(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.columns.iter().filter(|c| c.is_persisted())
    }

    pub fn get(&self, key: &str) -> Option<&ColumnDefinition> {
        self.by_key.get(key).map(|&i| &self.columns[i])
    }

    /// Lookup by display code (case-insensitive, surrounding whitespace ignored)
    pub fn by_code(&self, code: &str) -> Option<&ColumnDefinition> {
        self.by_code
            .get(&normalize_code(code))
            .map(|&i| &self.columns[i])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn action_column(&self) -> Option<&ColumnDefinition> {
        self.get(ACTION_COLUMN)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
