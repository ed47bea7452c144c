//! Recipe <-> file text
//!
//! Load order: header (fatal on error), body binding and rows, row count and
//! body hash, configuration fingerprints, row values, structure and targets.
//! Integrity and compatibility problems are reported on their own; a file
//! whose body does not match its header never yields per-row noise.

use std::sync::Arc;
use tracing::{debug, warn};

use depo_model::{
    ActionCatalog, ColumnDefinition, ColumnSchema, ModelError, Property, PropertyType, Recipe,
    Step, TargetChecker, ACTION_COLUMN,
};

use super::fingerprint::{
    action_fingerprint, body_fingerprint, canonical_writer, schema_fingerprint, Fingerprint,
};
use super::header::{FieldSeparator, RecipeFileMetadata};
use super::{FileError, FileErrors};
use crate::analysis::StructureAnalyzer;

const BOM: char = '\u{feff}';

/// A recipe read from a file, with the metadata it was stored under
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedRecipe {
    pub recipe: Recipe,
    pub metadata: RecipeFileMetadata,
}

/// Reads and writes the recipe file format
#[derive(Clone)]
pub struct RecipeFileCodec {
    schema: Arc<ColumnSchema>,
    catalog: Arc<ActionCatalog>,
    analyzer: StructureAnalyzer,
    targets: Arc<dyn TargetChecker>,
    separator: FieldSeparator,
    schema_fingerprint: Fingerprint,
    action_fingerprint: Fingerprint,
}

impl std::fmt::Debug for RecipeFileCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecipeFileCodec")
            .field("separator", &self.separator)
            .field("schema_fingerprint", &self.schema_fingerprint)
            .field("action_fingerprint", &self.action_fingerprint)
            .finish_non_exhaustive()
    }
}

/// Column header of the body, bound to schema columns
struct Binding<'a> {
    columns: Vec<&'a ColumnDefinition>,
    action_position: usize,
}

impl RecipeFileCodec {
    pub fn new(
        schema: Arc<ColumnSchema>,
        catalog: Arc<ActionCatalog>,
        analyzer: StructureAnalyzer,
        targets: Arc<dyn TargetChecker>,
        separator: FieldSeparator,
    ) -> Self {
        let schema_fingerprint = schema_fingerprint(&schema);
        let action_fingerprint = action_fingerprint(&catalog);
        Self {
            schema,
            catalog,
            analyzer,
            targets,
            separator,
            schema_fingerprint,
            action_fingerprint,
        }
    }

    pub fn separator(&self) -> FieldSeparator {
        self.separator
    }

    pub fn schema_fingerprint(&self) -> Fingerprint {
        self.schema_fingerprint
    }

    pub fn action_fingerprint(&self) -> Fingerprint {
        self.action_fingerprint
    }

    // ------------------------------------------------------------------------
    // Serialize
    // ------------------------------------------------------------------------

    /// Render a recipe as file text
    pub fn serialize(&self, recipe: &Recipe) -> Result<String, FileError> {
        self.serialize_with(recipe, &[])
    }

    /// Render a recipe, adding free-form header extras
    pub fn serialize_with(
        &self,
        recipe: &Recipe,
        extras: &[(&str, &str)],
    ) -> Result<String, FileError> {
        let body = self.write_body(recipe)?;
        let body = String::from_utf8(body).map_err(|e| FileError::Csv(e.to_string()))?;

        let mut metadata = RecipeFileMetadata::new(
            self.separator,
            self.schema_fingerprint,
            self.action_fingerprint,
            recipe.len(),
            body_fingerprint(&body),
        );
        for (key, value) in extras {
            metadata.insert_extra(*key, *value)?;
        }

        let mut text = String::with_capacity(body.len() + 256);
        text.push(BOM);
        text.push_str(&metadata.format());
        text.push('\n');
        text.push_str(&body);

        debug!("Serialized recipe: {} rows, body {}", recipe.len(), metadata.body);
        Ok(text)
    }

    fn write_body(&self, recipe: &Recipe) -> Result<Vec<u8>, FileError> {
        let columns: Vec<&ColumnDefinition> = self.schema.persisted().collect();
        let mut writer = canonical_writer(self.separator).from_writer(Vec::new());

        writer.write_record(columns.iter().map(|c| c.code.as_str()))?;

        for (row, step) in recipe.iter().enumerate() {
            let definition = self
                .catalog
                .get(step.action())
                .ok_or(FileError::UnknownAction {
                    row,
                    action: step.action(),
                })?;

            let mut record: Vec<String> = Vec::with_capacity(columns.len());
            for column in &columns {
                if column.key.as_str() == ACTION_COLUMN {
                    record.push(Property::int16(step.action()).format());
                    continue;
                }
                let field = match step.get(column.key.as_str()) {
                    Some(property) if property.kind() != column.property_type => {
                        return Err(FileError::TypeMismatch {
                            row,
                            code: column.code.clone(),
                            expected: column.property_type,
                            actual: property.kind(),
                        })
                    },
                    Some(_) if !definition.is_applicable(column.key.as_str()) => {
                        return Err(FileError::NotApplicable {
                            row,
                            code: column.code.clone(),
                        })
                    },
                    Some(property) => property.format(),
                    None => String::new(),
                };
                record.push(field);
            }
            writer.write_record(&record)?;
        }

        writer
            .into_inner()
            .map_err(|e| FileError::Csv(e.error().to_string()))
    }

    // ------------------------------------------------------------------------
    // Deserialize
    // ------------------------------------------------------------------------

    /// Parse file text into a recipe
    ///
    /// Either the whole recipe is returned or every problem found; a file is
    /// never partially accepted.
    pub fn deserialize(&self, text: &str) -> Result<LoadedRecipe, FileErrors> {
        let text = text.strip_prefix(BOM).unwrap_or(text);
        let (header_line, body) = text.split_once('\n').unwrap_or((text, ""));

        let metadata = RecipeFileMetadata::parse(header_line).map_err(FileError::from)?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(metadata.separator.as_byte())
            .from_reader(body.as_bytes());

        let mut binding: Option<Result<Binding<'_>, Vec<FileError>>> = None;
        let mut integrity: Vec<FileError> = Vec::new();
        let mut row_errors: Vec<FileError> = Vec::new();
        let mut steps: Vec<Step> = Vec::new();
        let mut rows = 0usize;

        for result in reader.records() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    let line = e.position().map_or(0, |p| p.line());
                    integrity.push(FileError::Malformed {
                        line,
                        reason: e.to_string(),
                    });
                    break;
                },
            };

            if binding.is_none() {
                binding = Some(self.bind(&record));
                continue;
            }

            let row = rows;
            rows += 1;
            if let Some(Ok(bound)) = &binding {
                match self.parse_row(row, bound, &record) {
                    Ok(step) => steps.push(step),
                    Err(mut errors) => row_errors.append(&mut errors),
                }
            }
        }

        let Some(binding) = binding else {
            integrity.push(FileError::MissingColumnHeader);
            return Err(FileErrors::new(integrity));
        };

        if integrity.is_empty() {
            if rows != metadata.rows {
                integrity.push(FileError::RowCountMismatch {
                    declared: metadata.rows,
                    actual: rows,
                });
            }
            let actual = body_fingerprint(body);
            if actual != metadata.body {
                integrity.push(FileError::BodyHashMismatch {
                    declared: metadata.body,
                    actual,
                });
            }
        }
        if !integrity.is_empty() {
            warn!("Recipe file failed integrity checks: {}", integrity[0]);
            return Err(FileErrors::new(integrity));
        }

        let mut incompatible = Vec::new();
        if metadata.schema != self.schema_fingerprint {
            incompatible.push(FileError::SchemaMismatch {
                declared: metadata.schema,
                current: self.schema_fingerprint,
            });
        }
        if metadata.actions != self.action_fingerprint {
            incompatible.push(FileError::ActionsMismatch {
                declared: metadata.actions,
                current: self.action_fingerprint,
            });
        }
        if !incompatible.is_empty() {
            warn!("Recipe file is from an incompatible configuration");
            return Err(FileErrors::new(incompatible));
        }

        let mut errors = binding.err().unwrap_or_default();
        errors.append(&mut row_errors);
        if !errors.is_empty() {
            return Err(FileErrors::new(errors));
        }

        let recipe = Recipe::new(steps);
        self.check_recipe(&recipe)?;

        debug!("Deserialized recipe: {} rows", recipe.len());
        Ok(LoadedRecipe { recipe, metadata })
    }

    /// Bind the body's header row to schema columns by code
    fn bind(&self, record: &csv::StringRecord) -> Result<Binding<'_>, Vec<FileError>> {
        let mut errors = Vec::new();
        let mut columns: Vec<&ColumnDefinition> = Vec::with_capacity(record.len());

        for code in record.iter() {
            match self.schema.by_code(code) {
                Some(column) if column.is_persisted() => {
                    if columns.iter().any(|c| c.key == column.key) {
                        errors.push(FileError::DuplicateColumn {
                            code: code.to_string(),
                        });
                    }
                    columns.push(column);
                },
                _ => errors.push(FileError::UnknownColumn {
                    code: code.to_string(),
                }),
            }
        }

        for column in self.schema.persisted() {
            if !columns.iter().any(|c| c.key == column.key) {
                errors.push(FileError::MissingColumn {
                    code: column.code.clone(),
                });
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }
        let action_position = columns
            .iter()
            .position(|c| c.key.as_str() == ACTION_COLUMN)
            .ok_or_else(|| {
                vec![FileError::MissingColumn {
                    code: ACTION_COLUMN.to_string(),
                }]
            })?;

        Ok(Binding {
            columns,
            action_position,
        })
    }

    fn parse_row(
        &self,
        row: usize,
        binding: &Binding<'_>,
        record: &csv::StringRecord,
    ) -> Result<Step, Vec<FileError>> {
        if record.len() != binding.columns.len() {
            return Err(vec![FileError::FieldCount {
                row,
                expected: binding.columns.len(),
                actual: record.len(),
            }]);
        }

        let action_column = binding.columns[binding.action_position];
        let action_text = record.get(binding.action_position).unwrap_or_default();
        let action = action_text.trim().parse::<i16>().map_err(|e| {
            vec![FileError::InvalidValue {
                row,
                code: action_column.code.clone(),
                source: ModelError::Parse {
                    expected: PropertyType::Int16,
                    text: action_text.to_string(),
                    reason: e.to_string(),
                },
            }]
        })?;
        let definition = self
            .catalog
            .get(action)
            .ok_or_else(|| vec![FileError::UnknownAction { row, action }])?;

        let mut errors = Vec::new();
        let mut scaffold = Step::builder(definition);
        for (position, (column, text)) in binding.columns.iter().zip(record.iter()).enumerate() {
            if position == binding.action_position || text.is_empty() {
                continue;
            }
            if !scaffold.accepts(column.key.as_str()) {
                errors.push(FileError::NotApplicable {
                    row,
                    code: column.code.clone(),
                });
                continue;
            }
            match Property::parse(column.property_type, text) {
                Ok(property) => {
                    scaffold.set(column.key.as_str(), property);
                },
                Err(source) => errors.push(FileError::InvalidValue {
                    row,
                    code: column.code.clone(),
                    source,
                }),
            }
        }

        if errors.is_empty() {
            Ok(scaffold.build())
        } else {
            Err(errors)
        }
    }

    /// Loop structure and target availability of a fully parsed recipe
    fn check_recipe(&self, recipe: &Recipe) -> Result<(), FileErrors> {
        let mut errors = Vec::new();
        if let Err(e) = self.analyzer.validate(recipe) {
            errors.push(FileError::Structure(e));
        }

        for (row, step) in recipe.iter().enumerate() {
            let target = self
                .catalog
                .get(step.action())
                .and_then(|def| def.target.as_deref());
            if let Some(target) = target {
                if !self.targets.target_exists(target) {
                    errors.push(FileError::MissingTarget {
                        row,
                        target: target.to_string(),
                    });
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(FileErrors::new(errors))
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::test_utils::{context, end_for, for_loop, open_valve, set_flow, wait};
    use depo_model::TargetSet;

    fn codec() -> RecipeFileCodec {
        context().file_codec()
    }

    fn sample() -> Recipe {
        let ctx = context();
        let noted_wait = Step::builder(ctx.catalog.get(3).unwrap())
            .with("duration", Property::float32(12.5))
            .with("comment", Property::string("purge, \"slow\"").unwrap())
            .build();
        Recipe::new(vec![
            open_valve(true),
            for_loop(3),
            set_flow(2.75),
            noted_wait,
            end_for(),
            wait(0.1),
        ])
    }

    fn body_of(text: &str) -> &str {
        text.split_once('\n').unwrap().1
    }

    #[test]
    fn test_layout_of_serialized_text() {
        let text = codec().serialize(&sample()).unwrap();
        assert!(text.starts_with('\u{feff}'));
        assert!(text[3..].starts_with("#DEPO-RECIPE;1;sep=comma;"));

        let body = body_of(&text);
        let mut lines = body.lines();
        assert_eq!(lines.next(), Some("ACT,N,DUR,VALVE,TEMP,FLOW,NOTE"));
        assert_eq!(lines.next(), Some("1,,,true,,,"));
        assert_eq!(lines.next(), Some("10,3,,,,,"));
        assert_eq!(lines.next(), Some("4,,,,,2.75,"));
        assert_eq!(lines.next(), Some("3,,12.5,,,,\"purge, \"\"slow\"\"\""));
        assert_eq!(lines.next(), Some("11,,,,,,"));
        assert_eq!(lines.next(), Some("3,,0.1,,,,"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_round_trip_is_byte_identical() {
        let codec = codec();
        let text = codec.serialize(&sample()).unwrap();
        let loaded = codec.deserialize(&text).unwrap();

        assert_eq!(loaded.recipe, sample());
        assert_eq!(loaded.metadata.rows, 6);
        assert_eq!(codec.serialize(&loaded.recipe).unwrap(), text);
    }

    #[test]
    fn test_empty_comment_round_trips() {
        let ctx = context();
        let blank = Step::builder(ctx.catalog.get(3).unwrap())
            .with("duration", Property::float32(2.5))
            .with("comment", Property::string("").unwrap())
            .build();
        let recipe = Recipe::new(vec![blank]);

        let codec = codec();
        let text = codec.serialize(&recipe).unwrap();
        assert_eq!(body_of(&text).lines().nth(1), Some("3,,2.5,,,,"));
        assert_eq!(codec.deserialize(&text).unwrap().recipe, recipe);
    }

    #[test]
    fn test_missing_bom_and_crlf_are_accepted() {
        let codec = codec();
        let text = codec.serialize(&sample()).unwrap();
        let plain = text.trim_start_matches('\u{feff}').replace('\n', "\r\n");
        assert_eq!(codec.deserialize(&plain).unwrap().recipe, sample());
    }

    #[test]
    fn test_garbled_signature_short_circuits() {
        let codec = codec();
        let text = codec.serialize(&sample()).unwrap();
        let garbled = text.replacen("#DEPO-RECIPE", "#DEPO-RECIPF", 1);

        let errors = codec.deserialize(&garbled).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors.errors()[0], FileError::Header(_)));
    }

    #[test]
    fn test_row_count_mismatch() {
        let codec = codec();
        let text = codec.serialize(&sample()).unwrap();
        let edited = text.replacen(";rows=6;", ";rows=5;", 1);

        let errors = codec.deserialize(&edited).unwrap_err();
        assert_eq!(
            errors.first(),
            Some(&FileError::RowCountMismatch {
                declared: 5,
                actual: 6,
            })
        );
        assert!(errors.errors().iter().all(FileError::is_integrity));
    }

    #[test]
    fn test_edited_column_header_fails_hash_check() {
        let codec = codec();
        let text = codec.serialize(&sample()).unwrap();
        // Renaming a column changes the body hash first
        let edited = text.replacen("ACT,N,", "ACT,NN,", 1);
        let errors = codec.deserialize(&edited).unwrap_err();
        assert!(matches!(
            errors.errors(),
            [FileError::BodyHashMismatch { .. }]
        ));
    }

    #[test]
    fn test_line_feed_turned_carriage_return_fails_hash_check() {
        let codec = codec();
        let text = codec.serialize(&sample()).unwrap();
        let body_start = text.find('\n').unwrap() + 1;
        let row_end = body_start + text[body_start..].find('\n').unwrap();

        // The csv reader splits rows on a lone CR too, so only the hash notices
        let mut edited = text.clone();
        edited.replace_range(row_end..row_end + 1, "\r");
        let errors = codec.deserialize(&edited).unwrap_err();
        assert!(matches!(
            errors.errors(),
            [FileError::BodyHashMismatch { .. }]
        ));
    }

    #[test]
    fn test_missing_target_rejected() {
        let ctx = context();
        let text = ctx.file_codec().serialize(&sample()).unwrap();

        let targets: TargetSet = ["heater_1", "mfc_1"].into_iter().collect();
        let codec = RecipeFileCodec::new(
            ctx.schema.clone(),
            ctx.catalog.clone(),
            ctx.analyzer(),
            Arc::new(targets),
            FieldSeparator::Comma,
        );
        let errors = codec.deserialize(&text).unwrap_err();
        assert_eq!(
            errors.errors(),
            &[FileError::MissingTarget {
                row: 0,
                target: "valve_1".to_string(),
            }]
        );
    }

    #[test]
    fn test_unbalanced_loops_rejected_on_load() {
        let codec = codec();
        let recipe = Recipe::new(vec![for_loop(2), wait(1.0)]);
        let text = codec.serialize(&recipe).unwrap();
        let errors = codec.deserialize(&text).unwrap_err();
        assert!(matches!(errors.errors(), [FileError::Structure(_)]));
    }

    #[test]
    fn test_serialize_rejects_mistyped_property() {
        let ctx = context();
        let step = Step::builder(ctx.catalog.get(3).unwrap())
            .with("duration", Property::int16(5))
            .build();
        assert!(matches!(
            codec().serialize(&Recipe::new(vec![step])),
            Err(FileError::TypeMismatch { row: 0, .. })
        ));
    }

    #[test]
    fn test_semicolon_separator() {
        let ctx = context();
        let codec = RecipeFileCodec::new(
            ctx.schema.clone(),
            ctx.catalog.clone(),
            ctx.analyzer(),
            ctx.targets.clone(),
            FieldSeparator::Semicolon,
        );
        let text = codec.serialize(&sample()).unwrap();
        assert!(body_of(&text).starts_with("ACT;N;DUR;"));
        assert_eq!(codec.deserialize(&text).unwrap().recipe, sample());

        // A comma codec still reads it: the separator comes from the header
        assert_eq!(
            ctx.file_codec().deserialize(&text).unwrap().recipe,
            sample()
        );
    }

    #[test]
    fn test_empty_recipe() {
        let codec = codec();
        let text = codec.serialize(&Recipe::empty()).unwrap();
        let loaded = codec.deserialize(&text).unwrap();
        assert!(loaded.recipe.is_empty());
        assert_eq!(loaded.metadata.rows, 0);
    }

    #[test]
    fn test_header_only_file() {
        let codec = codec();
        let text = codec.serialize(&Recipe::empty()).unwrap();
        let header_only = text.split_once('\n').unwrap().0;
        let errors = codec.deserialize(header_only).unwrap_err();
        assert_eq!(errors.errors(), &[FileError::MissingColumnHeader]);
    }
}
