//! Register capacity check
//!
//! Runs before any transfer on the send path, and on the receive path
//! against the row count reported by the controller.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use depo_model::{PlcArea, Recipe};

use crate::layout::RegisterLayout;

/// Capacity errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CapacityError {
    #[error(
        "{area} area too small: {required} registers required, {available} available ({overflow} over)"
    )]
    Exceeded {
        area: PlcArea,
        required: usize,
        available: usize,
        overflow: usize,
    },

    #[error("{rows} rows cannot be represented in the row count register")]
    TooManyRows { rows: usize },
}

/// Configured register area sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlcAreaSizes {
    pub int_registers: usize,
    pub float_registers: usize,
}

/// Register footprint of a recipe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footprint {
    pub rows: usize,
    pub int_registers: usize,
    pub float_registers: usize,
}

/// Checks recipe footprints against the configured areas
#[derive(Debug, Clone)]
pub struct CapacityCalculator {
    layout: Arc<RegisterLayout>,
    sizes: PlcAreaSizes,
}

impl CapacityCalculator {
    pub fn new(layout: Arc<RegisterLayout>, sizes: PlcAreaSizes) -> Self {
        Self { layout, sizes }
    }

    pub fn sizes(&self) -> PlcAreaSizes {
        self.sizes
    }

    pub fn check(&self, recipe: &Recipe) -> Result<Footprint, CapacityError> {
        self.check_rows(recipe.len())
    }

    /// Check a row count, e.g. one reported by the controller
    pub fn check_rows(&self, rows: usize) -> Result<Footprint, CapacityError> {
        if rows > u16::MAX as usize {
            return Err(CapacityError::TooManyRows { rows });
        }

        let (int_registers, float_registers) = self.layout.registers_for(rows);
        Self::fits(PlcArea::Int, int_registers, self.sizes.int_registers)?;
        Self::fits(PlcArea::Float, float_registers, self.sizes.float_registers)?;

        Ok(Footprint {
            rows,
            int_registers,
            float_registers,
        })
    }

    fn fits(area: PlcArea, required: usize, available: usize) -> Result<(), CapacityError> {
        if required > available {
            return Err(CapacityError::Exceeded {
                area,
                required,
                available,
                overflow: required - available,
            });
        }
        Ok(())
    }

    /// Largest row count that fits both areas
    pub fn max_rows(&self) -> usize {
        let per_area = |available: usize, per_row: usize| {
            available.checked_div(per_row).unwrap_or(usize::MAX)
        };
        per_area(self.sizes.int_registers, self.layout.int_columns())
            .min(per_area(
                self.sizes.float_registers,
                self.layout.float_registers_per_row(),
            ))
            .min(u16::MAX as usize)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::test_utils::context;

    fn calculator(int_registers: usize, float_registers: usize) -> CapacityCalculator {
        CapacityCalculator::new(
            context().layout.clone(),
            PlcAreaSizes {
                int_registers,
                float_registers,
            },
        )
    }

    #[test]
    fn test_1000_rows_against_int_area_sizes() {
        // Sample layout: 3 int registers, 3 floats (6 registers) per row
        let rejected = calculator(500, 100_000).check_rows(1000).unwrap_err();
        assert_eq!(
            rejected,
            CapacityError::Exceeded {
                area: PlcArea::Int,
                required: 3000,
                available: 500,
                overflow: 2500,
            }
        );

        let footprint = calculator(50_000, 100_000).check_rows(1000).unwrap();
        assert_eq!(footprint.int_registers, 3000);
        assert_eq!(footprint.float_registers, 6000);
    }

    #[test]
    fn test_float_area_checked() {
        let err = calculator(50_000, 5_999).check_rows(1000).unwrap_err();
        assert!(matches!(
            err,
            CapacityError::Exceeded {
                area: PlcArea::Float,
                overflow: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_exact_fit_and_max_rows() {
        let calc = calculator(300, 600);
        assert_eq!(calc.max_rows(), 100);
        assert!(calc.check_rows(100).is_ok());
        assert!(calc.check_rows(101).is_err());
        assert!(calc.check_rows(0).is_ok());
    }

    #[test]
    fn test_row_count_register_limit() {
        let calc = calculator(usize::MAX / 8, usize::MAX / 8);
        assert_eq!(
            calc.check_rows(70_000).unwrap_err(),
            CapacityError::TooManyRows { rows: 70_000 }
        );
    }
}
