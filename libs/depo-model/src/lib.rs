//! Depo Model - recipe domain types
//!
//! Value types shared by the recipe service:
//! - `Property` / `PropertyType`: typed step values
//! - `ColumnDefinition` / `ColumnSchema`: column declarations and PLC mappings
//! - `ActionDefinition` / `ActionCatalog`: declared operation types
//! - `Step` / `Recipe`: immutable recipe rows
//! - `TargetChecker`: hardware target availability

pub mod action;
pub mod column;
pub mod error;
pub mod property;
pub mod recipe;
pub mod target;

pub use action::{ActionCatalog, ActionDefinition, ActionKind, DurationClass};
pub use column::{
    ColumnDefinition, ColumnKey, ColumnSchema, PlcArea, PlcMapping, ACTION_COLUMN,
    DURATION_COLUMN, ITERATIONS_COLUMN,
};
pub use error::{ModelError, Result};
pub use property::{Property, PropertyType, PropertyValue, MAX_STRING_LEN};
pub use recipe::{Recipe, Step, StepScaffold};
pub use target::{TargetChecker, TargetSet};
