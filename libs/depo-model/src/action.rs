//! Action definitions and the immutable action catalog

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::column::{ColumnKey, ColumnSchema, ACTION_COLUMN, DURATION_COLUMN, ITERATIONS_COLUMN};
use crate::error::{ModelError, Result};

/// Structural role of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    #[default]
    Plain,
    /// Opens a loop body ("for")
    LoopOpen,
    /// Closes the innermost open loop ("end for")
    LoopClose,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::LoopOpen => "loop_open",
            Self::LoopClose => "loop_close",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Duration classification of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationClass {
    /// Takes no recipe time (e.g. open valve)
    #[default]
    Instant,
    /// Occupies real elapsed time given by the duration column (e.g. wait)
    LongLasting,
}

impl DurationClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instant => "instant",
            Self::LongLasting => "long_lasting",
        }
    }
}

/// A declared operation type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDefinition {
    pub id: i16,
    pub name: String,
    #[serde(default)]
    pub kind: ActionKind,
    #[serde(default)]
    pub duration: DurationClass,
    /// Hardware target the action drives (valve, heater ...), if any
    #[serde(default)]
    pub target: Option<String>,
    /// Columns that carry a value for this action
    #[serde(default)]
    pub columns: Vec<ColumnKey>,
}

impl ActionDefinition {
    pub fn new(id: i16, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind: ActionKind::Plain,
            duration: DurationClass::Instant,
            target: None,
            columns: Vec::new(),
        }
    }

    pub fn with_kind(mut self, kind: ActionKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn long_lasting(mut self) -> Self {
        self.duration = DurationClass::LongLasting;
        self
    }

    pub fn with_target(mut self, target: &str) -> Self {
        self.target = Some(target.to_string());
        self
    }

    pub fn with_columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| ColumnKey::from(*c)).collect();
        self
    }

    /// Whether the action carries a value in the given column
    pub fn is_applicable(&self, key: &str) -> bool {
        self.columns.iter().any(|c| c.as_str() == key)
    }
}

/// Immutable lookup table of action definitions, keyed by id
#[derive(Debug, Clone)]
pub struct ActionCatalog {
    actions: Vec<ActionDefinition>,
    by_id: AHashMap<i16, usize>,
}

impl ActionCatalog {
    /// Build the catalog, checking every action against the column schema
    pub fn new(mut actions: Vec<ActionDefinition>, schema: &ColumnSchema) -> Result<Self> {
        actions.sort_by_key(|a| a.id);

        let mut by_id = AHashMap::with_capacity(actions.len());
        for (i, action) in actions.iter().enumerate() {
            if by_id.insert(action.id, i).is_some() {
                return Err(ModelError::DuplicateAction(action.id));
            }
            Self::check_action(action, schema)?;
        }

        Ok(Self { actions, by_id })
    }

    fn check_action(action: &ActionDefinition, schema: &ColumnSchema) -> Result<()> {
        for column in &action.columns {
            if !schema.contains(column.as_str()) {
                return Err(ModelError::UnknownColumn {
                    action: action.name.clone(),
                    column: column.to_string(),
                });
            }
            if column.as_str() == ACTION_COLUMN {
                return Err(ModelError::InvalidAction {
                    action: action.name.clone(),
                    reason: "the action column is implicit".to_string(),
                });
            }
        }

        let invalid = |reason: &str| ModelError::InvalidAction {
            action: action.name.clone(),
            reason: reason.to_string(),
        };

        if action.kind == ActionKind::LoopOpen && !action.is_applicable(ITERATIONS_COLUMN) {
            return Err(invalid("loop-open action must declare the iterations column"));
        }
        if action.kind != ActionKind::Plain && action.duration == DurationClass::LongLasting {
            return Err(invalid("loop markers cannot be long-lasting"));
        }
        if action.duration == DurationClass::LongLasting && !action.is_applicable(DURATION_COLUMN)
        {
            return Err(invalid("long-lasting action must declare the duration column"));
        }
        Ok(())
    }

    pub fn get(&self, id: i16) -> Option<&ActionDefinition> {
        self.by_id.get(&id).map(|&i| &self.actions[i])
    }

    /// Definitions in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = &ActionDefinition> {
        self.actions.iter()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
