//! Recipe <-> register image conversion
//!
//! Packs every mapped column of every step into the integer and float areas
//! described by [`RegisterLayout`], and unpacks such areas back into steps.

use std::sync::Arc;
use thiserror::Error;

use depo_comlink::bytes::{f32_to_regs, i16_to_reg, reg_to_i16, regs_to_f32};
use depo_comlink::ByteOrder;
use depo_model::{
    ActionCatalog, ActionDefinition, PlcArea, Property, PropertyType, PropertyValue, Recipe, Step,
};

use crate::layout::{ColumnSlot, RegisterLayout};

/// Register codec errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlcCodecError {
    #[error("Row {row}: missing value for column '{key}'")]
    MissingProperty { row: usize, key: String },

    #[error("Row {row}: column '{key}' expects {expected}, step holds {actual}")]
    TypeMismatch {
        row: usize,
        key: String,
        expected: PropertyType,
        actual: PropertyType,
    },

    #[error("Row {row}: unknown action id {action}")]
    UnknownAction { row: usize, action: i16 },

    #[error("Row {row}: column '{key}' at offset {offset} is outside the {len}-register area")]
    IndexOutOfRange {
        row: usize,
        key: String,
        offset: usize,
        len: usize,
    },

    #[error("Row {row}: column '{key}' holds {value}, not a boolean")]
    InvalidBool { row: usize, key: String, value: u16 },
}

/// Contents of the integer and float areas for a whole recipe
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterImage {
    pub ints: Vec<u16>,
    pub floats: Vec<u16>,
}

/// Packs and unpacks recipes using a fixed layout
#[derive(Debug, Clone)]
pub struct PlcRecipeCodec {
    layout: Arc<RegisterLayout>,
    catalog: Arc<ActionCatalog>,
    word_order: ByteOrder,
}

impl PlcRecipeCodec {
    pub fn new(
        layout: Arc<RegisterLayout>,
        catalog: Arc<ActionCatalog>,
        word_order: ByteOrder,
    ) -> Self {
        Self {
            layout,
            catalog,
            word_order,
        }
    }

    pub fn layout(&self) -> &RegisterLayout {
        &self.layout
    }

    pub fn word_order(&self) -> ByteOrder {
        self.word_order
    }

    fn definition(&self, row: usize, action: i16) -> Result<&ActionDefinition, PlcCodecError> {
        self.catalog
            .get(action)
            .ok_or(PlcCodecError::UnknownAction { row, action })
    }

    /// Pack a recipe into register areas
    ///
    /// Slots of columns the step's action does not use are left at zero.
    pub fn to_registers(&self, recipe: &Recipe) -> Result<RegisterImage, PlcCodecError> {
        let (int_len, float_len) = self.layout.registers_for(recipe.len());
        let mut image = RegisterImage {
            ints: vec![0; int_len],
            floats: vec![0; float_len],
        };

        for (row, step) in recipe.iter().enumerate() {
            let definition = self.definition(row, step.action())?;

            let action_offset = row * self.layout.int_columns() + self.layout.action_index() as usize;
            image.ints[action_offset] = i16_to_reg(step.action());

            for slot in self.layout.value_slots() {
                if !definition.is_applicable(slot.key.as_str()) {
                    continue;
                }
                let property =
                    step.get(slot.key.as_str())
                        .ok_or_else(|| PlcCodecError::MissingProperty {
                            row,
                            key: slot.key.to_string(),
                        })?;
                self.pack(&mut image, row, slot, property)?;
            }
        }

        Ok(image)
    }

    fn pack(
        &self,
        image: &mut RegisterImage,
        row: usize,
        slot: &ColumnSlot,
        property: &Property,
    ) -> Result<(), PlcCodecError> {
        let offset = self.layout.offset(row, slot);
        match (slot.kind, property.value()) {
            (PropertyType::Int16, PropertyValue::Int16(v)) => image.ints[offset] = i16_to_reg(*v),
            (PropertyType::Bool, PropertyValue::Bool(b)) => image.ints[offset] = u16::from(*b),
            (PropertyType::Float32, PropertyValue::Float32(v)) => {
                let [hi, lo] = f32_to_regs(*v, self.word_order);
                image.floats[offset] = hi;
                image.floats[offset + 1] = lo;
            },
            (expected, value) => {
                return Err(PlcCodecError::TypeMismatch {
                    row,
                    key: slot.key.to_string(),
                    expected,
                    actual: value.kind(),
                })
            },
        }
        Ok(())
    }

    /// Unpack `rows` steps from register areas
    pub fn from_registers(
        &self,
        image: &RegisterImage,
        rows: usize,
    ) -> Result<Recipe, PlcCodecError> {
        let mut steps = Vec::with_capacity(rows);

        for row in 0..rows {
            let action_offset = row * self.layout.int_columns() + self.layout.action_index() as usize;
            let action = image
                .ints
                .get(action_offset)
                .copied()
                .map(reg_to_i16)
                .ok_or_else(|| PlcCodecError::IndexOutOfRange {
                    row,
                    key: depo_model::ACTION_COLUMN.to_string(),
                    offset: action_offset,
                    len: image.ints.len(),
                })?;
            let definition = self.definition(row, action)?;

            let mut scaffold = Step::builder(definition);
            for slot in self.layout.value_slots() {
                if !scaffold.accepts(slot.key.as_str()) {
                    continue;
                }
                let property = self.unpack(image, row, slot)?;
                scaffold.set(slot.key.as_str(), property);
            }
            steps.push(scaffold.build());
        }

        Ok(Recipe::new(steps))
    }

    fn unpack(
        &self,
        image: &RegisterImage,
        row: usize,
        slot: &ColumnSlot,
    ) -> Result<Property, PlcCodecError> {
        let offset = self.layout.offset(row, slot);
        let area = match slot.area {
            PlcArea::Int => &image.ints,
            PlcArea::Float => &image.floats,
        };
        let width = if slot.area == PlcArea::Float { 2 } else { 1 };
        let registers = area.get(offset..offset + width).ok_or_else(|| {
            PlcCodecError::IndexOutOfRange {
                row,
                key: slot.key.to_string(),
                offset,
                len: area.len(),
            }
        })?;

        let property = match slot.kind {
            PropertyType::Int16 => Property::int16(reg_to_i16(registers[0])),
            PropertyType::Bool => match registers[0] {
                0 => Property::boolean(false),
                1 => Property::boolean(true),
                value => {
                    return Err(PlcCodecError::InvalidBool {
                        row,
                        key: slot.key.to_string(),
                        value,
                    })
                },
            },
            PropertyType::Float32 => {
                Property::float32(regs_to_f32(&[registers[0], registers[1]], self.word_order))
            },
            // Strings never get a slot
            PropertyType::String => {
                return Err(PlcCodecError::TypeMismatch {
                    row,
                    key: slot.key.to_string(),
                    expected: PropertyType::String,
                    actual: PropertyType::Int16,
                })
            },
        };
        Ok(property)
    }
}
