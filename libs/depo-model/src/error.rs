//! Model Layer Error Types

use thiserror::Error;

use crate::property::PropertyType;

/// Result type for depo-model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Model layer errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    /// Two column definitions share a key
    #[error("Duplicate column key: {0}")]
    DuplicateColumn(String),

    /// Two column definitions share a display code
    #[error("Duplicate column code: {0}")]
    DuplicateCode(String),

    /// Two column definitions share an ordinal
    #[error("Duplicate column ordinal {ordinal} ({first}, {second})")]
    DuplicateOrdinal {
        ordinal: u16,
        first: String,
        second: String,
    },

    /// The schema has no action column
    #[error("Schema has no '{0}' column")]
    MissingActionColumn(String),

    /// A well-known column is declared with an unusable shape
    #[error("Invalid column '{key}': {reason}")]
    InvalidColumn { key: String, reason: String },

    /// Two action definitions share an id
    #[error("Duplicate action id: {0}")]
    DuplicateAction(i16),

    /// An action declares a column the schema does not know
    #[error("Action '{action}' references unknown column '{column}'")]
    UnknownColumn { action: String, column: String },

    /// An action definition is inconsistent
    #[error("Invalid action '{action}': {reason}")]
    InvalidAction { action: String, reason: String },

    /// Property value does not match its declared type
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: PropertyType,
        actual: PropertyType,
    },

    /// String property exceeds the maximum length
    #[error("String too long: {len} chars (max {max})")]
    StringTooLong { len: usize, max: usize },

    /// Text could not be parsed as the declared type
    #[error("Cannot parse '{text}' as {expected}: {reason}")]
    Parse {
        expected: PropertyType,
        text: String,
        reason: String,
    },
}
