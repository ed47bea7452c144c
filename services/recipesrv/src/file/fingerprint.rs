//! SHA-256 fingerprints of configuration and file bodies

use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use depo_model::{ActionCatalog, ColumnSchema};

use super::header::FieldSeparator;

const PREFIX: &str = "sha256:";

/// SHA-256 digest, written as `sha256:<hex>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PREFIX}{}", hex::encode(self.0))
    }
}

impl FromStr for Fingerprint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix(PREFIX)
            .ok_or_else(|| format!("expected '{PREFIX}' prefix"))?;
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(digits, &mut bytes).map_err(|e| e.to_string())?;
        Ok(Self(bytes))
    }
}

/// Fingerprint of the persisted columns
///
/// Covers key, code and type, sorted by key. Ordinals and PLC mappings do
/// not change how a file reads and are left out.
pub fn schema_fingerprint(schema: &ColumnSchema) -> Fingerprint {
    let mut lines: Vec<String> = schema
        .persisted()
        .map(|c| {
            format!(
                "{}|{}|{}",
                c.key,
                c.code.trim().to_ascii_lowercase(),
                c.property_type
            )
        })
        .collect();
    lines.sort();

    let mut hasher = Sha256::new();
    for line in lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    Fingerprint(hasher.finalize().into())
}

/// Fingerprint of the action catalog, in id order
pub fn action_fingerprint(catalog: &ActionCatalog) -> Fingerprint {
    let mut hasher = Sha256::new();
    for action in catalog.iter() {
        let mut columns: Vec<&str> = action.columns.iter().map(|c| c.as_str()).collect();
        columns.sort_unstable();
        let line = format!(
            "{}|{}|{}|{}|{}|{}\n",
            action.id,
            action.name,
            action.kind,
            action.duration.as_str(),
            action.target.as_deref().unwrap_or(""),
            columns.join(",")
        );
        hasher.update(line.as_bytes());
    }
    Fingerprint(hasher.finalize().into())
}

/// Writer settings for the file body
pub(crate) fn canonical_writer(separator: FieldSeparator) -> csv::WriterBuilder {
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(separator.as_byte())
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .has_headers(false);
    builder
}

/// Hash of the body text exactly as stored
///
/// Only `\r\n` line endings are folded to `\n`, so a file whose line endings
/// were converted still verifies. Every other byte, including a lone `\r`,
/// is hashed as is.
pub fn body_fingerprint(body: &str) -> Fingerprint {
    let mut hasher = Sha256::new();
    let mut rest = body;
    while let Some(pos) = rest.find("\r\n") {
        hasher.update(&rest.as_bytes()[..pos]);
        hasher.update(b"\n");
        rest = &rest[pos + 2..];
    }
    hasher.update(rest.as_bytes());
    Fingerprint(hasher.finalize().into())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::test_utils::context;
    use depo_model::{ActionDefinition, ColumnDefinition, PropertyType};

    #[test]
    fn test_display_and_parse() {
        let fp = Fingerprint::of(b"abc");
        let text = fp.to_string();
        assert_eq!(
            text,
            "sha256:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(text.parse::<Fingerprint>().unwrap(), fp);
        assert!("ba7816bf".parse::<Fingerprint>().is_err());
        assert!("sha256:zz".parse::<Fingerprint>().is_err());
    }

    #[test]
    fn test_body_fingerprint_folds_only_crlf() {
        let text = "ACT,NOTE\n3,\"purge, then wait\"\n1,\n";
        let base = body_fingerprint(text);
        assert_eq!(base, Fingerprint::of(text.as_bytes()));
        assert_eq!(body_fingerprint(&text.replace('\n', "\r\n")), base);

        // A lone carriage return is content, not a line ending
        let lone_cr = text.replacen('\n', "\r", 1);
        assert_ne!(body_fingerprint(&lone_cr), base);
        assert_ne!(body_fingerprint(&text.replacen('\n', "\r\r\n", 1)), base);
    }

    #[test]
    fn test_schema_fingerprint_ignores_order_and_read_only_columns() {
        let ctx = context();
        let base = schema_fingerprint(&ctx.schema);

        let mut columns: Vec<ColumnDefinition> = ctx.schema.columns().to_vec();
        columns.reverse();
        for (i, c) in columns.iter_mut().enumerate() {
            c.ordinal = i as u16;
            c.plc = None;
        }
        columns.push(ColumnDefinition::new("end_time", "T1", 99, PropertyType::Float32).read_only());
        let reordered = ColumnSchema::new(columns.clone()).unwrap();
        assert_eq!(schema_fingerprint(&reordered), base);

        columns.push(ColumnDefinition::new("pressure", "P", 100, PropertyType::Float32));
        let extended = ColumnSchema::new(columns).unwrap();
        assert_ne!(schema_fingerprint(&extended), base);
    }

    #[test]
    fn test_action_fingerprint_tracks_catalog_changes() {
        let ctx = context();
        let base = action_fingerprint(&ctx.catalog);

        let mut actions: Vec<ActionDefinition> = ctx.catalog.iter().cloned().collect();
        actions.reverse();
        let same = ActionCatalog::new(actions.clone(), &ctx.schema).unwrap();
        assert_eq!(action_fingerprint(&same), base);

        actions[0].target = Some("heater_2".to_string());
        let changed = ActionCatalog::new(actions, &ctx.schema).unwrap();
        assert_ne!(action_fingerprint(&changed), base);
    }
}
