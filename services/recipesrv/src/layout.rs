//! Register layout of one recipe row
//!
//! Derived once from the column schema. The integer area holds one register
//! per mapped int16/bool column, the float area two registers per mapped
//! float32 column. Unmapped indices inside an area are gaps written as zero.

use thiserror::Error;

use depo_model::{ColumnKey, ColumnSchema, PlcArea, PropertyType, ACTION_COLUMN};

/// Layout derivation errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LayoutError {
    #[error("Column '{key}' of type {kind} cannot be mapped to the {area} area")]
    Unmappable {
        key: String,
        kind: PropertyType,
        area: PlcArea,
    },

    #[error("Columns '{first}' and '{second}' share {area} index {index}")]
    Overlap {
        area: PlcArea,
        index: u16,
        first: String,
        second: String,
    },

    #[error("Read-only column '{0}' cannot have a PLC mapping")]
    ReadOnlyMapped(String),

    #[error("The action column must be mapped to the Int area")]
    ActionNotMapped,
}

/// Location of one column's value within a row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSlot {
    pub key: ColumnKey,
    pub kind: PropertyType,
    pub area: PlcArea,
    pub index: u16,
}

/// Per-row register footprint and column positions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterLayout {
    int_columns: usize,
    float_columns: usize,
    action_index: u16,
    slots: Vec<ColumnSlot>,
}

impl RegisterLayout {
    pub fn new(schema: &ColumnSchema) -> Result<Self, LayoutError> {
        let mut slots: Vec<ColumnSlot> = Vec::new();

        for column in schema.columns() {
            let Some(mapping) = column.plc else {
                continue;
            };
            if column.read_only {
                return Err(LayoutError::ReadOnlyMapped(column.key.to_string()));
            }

            let fits = match mapping.area {
                PlcArea::Int => column.property_type.fits_int_register(),
                PlcArea::Float => column.property_type == PropertyType::Float32,
            };
            if !fits {
                return Err(LayoutError::Unmappable {
                    key: column.key.to_string(),
                    kind: column.property_type,
                    area: mapping.area,
                });
            }

            if let Some(other) = slots
                .iter()
                .find(|s| s.area == mapping.area && s.index == mapping.index)
            {
                return Err(LayoutError::Overlap {
                    area: mapping.area,
                    index: mapping.index,
                    first: other.key.to_string(),
                    second: column.key.to_string(),
                });
            }

            slots.push(ColumnSlot {
                key: column.key.clone(),
                kind: column.property_type,
                area: mapping.area,
                index: mapping.index,
            });
        }

        let action_index = slots
            .iter()
            .find(|s| s.key.as_str() == ACTION_COLUMN && s.area == PlcArea::Int)
            .map(|s| s.index)
            .ok_or(LayoutError::ActionNotMapped)?;

        let width = |area: PlcArea| {
            slots
                .iter()
                .filter(|s| s.area == area)
                .map(|s| s.index as usize + 1)
                .max()
                .unwrap_or(0)
        };

        Ok(Self {
            int_columns: width(PlcArea::Int),
            float_columns: width(PlcArea::Float),
            action_index,
            slots,
        })
    }

    /// Integer registers per row (widest mapped index + 1)
    pub fn int_columns(&self) -> usize {
        self.int_columns
    }

    /// Float columns per row (widest mapped index + 1)
    pub fn float_columns(&self) -> usize {
        self.float_columns
    }

    /// Float-area registers per row (two per float column)
    pub fn float_registers_per_row(&self) -> usize {
        self.float_columns * 2
    }

    /// Index of the action id within a row of the integer area
    pub fn action_index(&self) -> u16 {
        self.action_index
    }

    /// All mapped columns, including the action column, in ordinal order
    pub fn slots(&self) -> &[ColumnSlot] {
        &self.slots
    }

    /// Mapped columns other than the action column
    pub fn value_slots(&self) -> impl Iterator<Item = &ColumnSlot> {
        self.slots
            .iter()
            .filter(|s| s.key.as_str() != ACTION_COLUMN)
    }

    pub fn slot(&self, key: &str) -> Option<&ColumnSlot> {
        self.slots.iter().find(|s| s.key.as_str() == key)
    }

    pub fn is_mapped(&self, key: &str) -> bool {
        self.slot(key).is_some()
    }

    /// Register offset within its area of `slot` in `row`
    pub fn offset(&self, row: usize, slot: &ColumnSlot) -> usize {
        match slot.area {
            PlcArea::Int => row * self.int_columns + slot.index as usize,
            PlcArea::Float => row * self.float_registers_per_row() + slot.index as usize * 2,
        }
    }

    /// Registers needed in each area for `rows` rows: (int, float)
    pub fn registers_for(&self, rows: usize) -> (usize, usize) {
        (
            rows * self.int_columns,
            rows * self.float_registers_per_row(),
        )
    }
}
