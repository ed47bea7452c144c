//! Recipe files
//!
//! UTF-8 text with a BOM: one metadata line (see [`header`]) followed by a
//! CSV body whose header row names columns by code. Loading checks the
//! metadata against the body and against the running configuration before
//! any recipe is returned.

pub mod codec;
pub mod fingerprint;
pub mod header;
pub mod store;

use std::fmt;
use thiserror::Error;

use depo_model::{ModelError, PropertyType};

use crate::analysis::StructureError;

pub use codec::{LoadedRecipe, RecipeFileCodec};
pub use fingerprint::{action_fingerprint, body_fingerprint, schema_fingerprint, Fingerprint};
pub use header::{FieldSeparator, HeaderError, RecipeFileMetadata, FORMAT_VERSION, SIGNATURE};
pub use store::RecipeFileStore;

/// One problem found while writing or reading a recipe file
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FileError {
    #[error("Invalid file header: {0}")]
    Header(#[from] HeaderError),

    #[error("Malformed CSV at line {line}: {reason}")]
    Malformed { line: u64, reason: String },

    #[error("File has no column header row")]
    MissingColumnHeader,

    #[error("Unknown column '{code}'")]
    UnknownColumn { code: String },

    #[error("Column '{code}' appears more than once")]
    DuplicateColumn { code: String },

    #[error("Required column '{code}' is missing")]
    MissingColumn { code: String },

    #[error("File corrupted or hand-edited: header declares {declared} rows, body has {actual}")]
    RowCountMismatch { declared: usize, actual: usize },

    #[error("File corrupted or hand-edited: body hash {actual} does not match {declared}")]
    BodyHashMismatch {
        declared: Fingerprint,
        actual: Fingerprint,
    },

    #[error("File is from an incompatible configuration: column schema {declared}, current {current}")]
    SchemaMismatch {
        declared: Fingerprint,
        current: Fingerprint,
    },

    #[error("File is from an incompatible configuration: action catalog {declared}, current {current}")]
    ActionsMismatch {
        declared: Fingerprint,
        current: Fingerprint,
    },

    #[error("Row {row}: expected {expected} fields, found {actual}")]
    FieldCount {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Row {row}, column '{code}': {source}")]
    InvalidValue {
        row: usize,
        code: String,
        #[source]
        source: ModelError,
    },

    #[error("Row {row}: unknown action id {action}")]
    UnknownAction { row: usize, action: i16 },

    #[error("Row {row}: column '{code}' does not apply to this action")]
    NotApplicable { row: usize, code: String },

    #[error("Row {row}: column '{code}' expects {expected}, step holds {actual}")]
    TypeMismatch {
        row: usize,
        code: String,
        expected: PropertyType,
        actual: PropertyType,
    },

    #[error(transparent)]
    Structure(#[from] StructureError),

    #[error("Row {row}: target '{target}' is not available")]
    MissingTarget { row: usize, target: String },

    #[error("CSV write error: {0}")]
    Csv(String),

    #[error("IO error on {path}: {message}")]
    Io { path: String, message: String },
}

impl FileError {
    /// Body or header no longer matches what was written
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Self::Header(_)
                | Self::Malformed { .. }
                | Self::MissingColumnHeader
                | Self::DuplicateColumn { .. }
                | Self::RowCountMismatch { .. }
                | Self::BodyHashMismatch { .. }
        )
    }

    /// File was written under a different configuration
    pub fn is_incompatible(&self) -> bool {
        matches!(
            self,
            Self::SchemaMismatch { .. }
                | Self::ActionsMismatch { .. }
                | Self::UnknownColumn { .. }
                | Self::MissingColumn { .. }
                | Self::MissingTarget { .. }
        )
    }
}

impl From<csv::Error> for FileError {
    fn from(err: csv::Error) -> Self {
        FileError::Csv(err.to_string())
    }
}

/// All problems found in one file
#[derive(Debug, Clone, PartialEq)]
pub struct FileErrors(Vec<FileError>);

impl FileErrors {
    pub fn new(errors: Vec<FileError>) -> Self {
        Self(errors)
    }

    pub fn errors(&self) -> &[FileError] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<FileError> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&FileError> {
        self.0.first()
    }
}

impl From<FileError> for FileErrors {
    fn from(err: FileError) -> Self {
        Self(vec![err])
    }
}

impl fmt::Display for FileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => f.write_str("no errors"),
            [only] => write!(f, "{only}"),
            [first, rest @ ..] => write!(f, "{first} (and {} more)", rest.len()),
        }
    }
}

impl std::error::Error for FileErrors {}
