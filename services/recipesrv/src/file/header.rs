//! Recipe file metadata line
//!
//! The first line of a recipe file, e.g.
//!
//! ```text
//! #DEPO-RECIPE;1;sep=comma;schema=sha256:…;actions=sha256:…;rows=12;body=sha256:…;exported_at=…
//! ```
//!
//! Fields are `;`-separated `key=value` pairs after the signature and the
//! format version. Unknown keys are kept as extras. This module is the only
//! place that touches the raw header text.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::fingerprint::Fingerprint;

/// Leading token of every recipe file
pub const SIGNATURE: &str = "#DEPO-RECIPE";

/// Current (and only) file format version
pub const FORMAT_VERSION: u32 = 1;

const KEY_SEPARATOR: &str = "sep";
const KEY_SCHEMA: &str = "schema";
const KEY_ACTIONS: &str = "actions";
const KEY_ROWS: &str = "rows";
const KEY_BODY: &str = "body";
const RESERVED_KEYS: [&str; 5] = [KEY_SEPARATOR, KEY_SCHEMA, KEY_ACTIONS, KEY_ROWS, KEY_BODY];

/// Header errors; any of these makes the file unreadable
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("Missing '#DEPO-RECIPE' signature, not a recipe file")]
    MissingSignature,

    #[error("Unsupported file format version '{0}'")]
    UnsupportedVersion(String),

    #[error("Header field '{0}' is missing")]
    MissingField(&'static str),

    #[error("Header field '{field}' has invalid value '{value}'")]
    InvalidField { field: String, value: String },

    #[error("Header field '{0}' appears more than once")]
    DuplicateField(String),

    #[error("Header extra '{key}' cannot be stored: {reason}")]
    InvalidExtra { key: String, reason: &'static str },
}

/// Field separator of the CSV body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSeparator {
    #[default]
    Comma,
    Semicolon,
    Tab,
}

impl FieldSeparator {
    pub fn as_byte(&self) -> u8 {
        match self {
            Self::Comma => b',',
            Self::Semicolon => b';',
            Self::Tab => b'\t',
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Comma => "comma",
            Self::Semicolon => "semicolon",
            Self::Tab => "tab",
        }
    }
}

impl fmt::Display for FieldSeparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldSeparator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "comma" => Ok(Self::Comma),
            "semicolon" => Ok(Self::Semicolon),
            "tab" => Ok(Self::Tab),
            other => Err(format!("unknown separator '{other}'")),
        }
    }
}

/// Parsed metadata line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeFileMetadata {
    pub version: u32,
    pub separator: FieldSeparator,
    pub schema: Fingerprint,
    pub actions: Fingerprint,
    pub rows: usize,
    pub body: Fingerprint,
    extras: BTreeMap<String, String>,
}

fn check_text(key: &str, text: &str) -> Result<(), HeaderError> {
    let invalid = |reason| HeaderError::InvalidExtra {
        key: key.to_string(),
        reason,
    };
    if text.contains(';') {
        return Err(invalid("contains ';'"));
    }
    if text.contains('\n') || text.contains('\r') {
        return Err(invalid("contains a line break"));
    }
    Ok(())
}

impl RecipeFileMetadata {
    pub fn new(
        separator: FieldSeparator,
        schema: Fingerprint,
        actions: Fingerprint,
        rows: usize,
        body: Fingerprint,
    ) -> Self {
        Self {
            version: FORMAT_VERSION,
            separator,
            schema,
            actions,
            rows,
            body,
            extras: BTreeMap::new(),
        }
    }

    /// Attach a free-form `key=value` pair
    pub fn insert_extra(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), HeaderError> {
        let (key, value) = (key.into(), value.into());
        check_text(&key, &key)?;
        check_text(&key, &value)?;
        if key.is_empty() || key.contains('=') {
            return Err(HeaderError::InvalidExtra {
                key,
                reason: "keys must be non-empty and free of '='",
            });
        }
        if RESERVED_KEYS.contains(&key.as_str()) {
            return Err(HeaderError::InvalidExtra {
                key,
                reason: "reserved key",
            });
        }
        self.extras.insert(key, value);
        Ok(())
    }

    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extras.get(key).map(String::as_str)
    }

    pub fn extras(&self) -> &BTreeMap<String, String> {
        &self.extras
    }

    /// Render the metadata line (without line terminator)
    pub fn format(&self) -> String {
        let mut line = format!(
            "{SIGNATURE};{};{KEY_SEPARATOR}={};{KEY_SCHEMA}={};{KEY_ACTIONS}={};{KEY_ROWS}={};{KEY_BODY}={}",
            self.version, self.separator, self.schema, self.actions, self.rows, self.body
        );
        for (key, value) in &self.extras {
            line.push(';');
            line.push_str(key);
            line.push('=');
            line.push_str(value);
        }
        line
    }

    /// Parse a metadata line
    pub fn parse(line: &str) -> Result<Self, HeaderError> {
        let mut parts = line.trim_end_matches(['\r', '\n']).split(';');

        if parts.next() != Some(SIGNATURE) {
            return Err(HeaderError::MissingSignature);
        }
        let version = parts.next().unwrap_or_default();
        if version.parse::<u32>() != Ok(FORMAT_VERSION) {
            return Err(HeaderError::UnsupportedVersion(version.to_string()));
        }

        let mut fields: BTreeMap<String, String> = BTreeMap::new();
        for part in parts {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| HeaderError::InvalidField {
                    field: part.to_string(),
                    value: String::new(),
                })?;
            if fields.insert(key.to_string(), value.to_string()).is_some() {
                return Err(HeaderError::DuplicateField(key.to_string()));
            }
        }

        let mut take = |key: &'static str| fields.remove(key).ok_or(HeaderError::MissingField(key));
        let invalid = |key: &str, value: &str| HeaderError::InvalidField {
            field: key.to_string(),
            value: value.to_string(),
        };

        let separator = take(KEY_SEPARATOR)?;
        let schema = take(KEY_SCHEMA)?;
        let actions = take(KEY_ACTIONS)?;
        let rows = take(KEY_ROWS)?;
        let body = take(KEY_BODY)?;

        Ok(Self {
            version: FORMAT_VERSION,
            separator: separator
                .parse()
                .map_err(|_| invalid(KEY_SEPARATOR, &separator))?,
            schema: schema.parse().map_err(|_| invalid(KEY_SCHEMA, &schema))?,
            actions: actions.parse().map_err(|_| invalid(KEY_ACTIONS, &actions))?,
            rows: rows.parse().map_err(|_| invalid(KEY_ROWS, &rows))?,
            body: body.parse().map_err(|_| invalid(KEY_BODY, &body))?,
            extras: fields,
        })
    }
}
