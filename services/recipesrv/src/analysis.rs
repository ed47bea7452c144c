//! Recipe structure analysis
//!
//! - `validate`: loop nesting, returns the nesting level of every step
//! - `calculate`: start time of every step and total recipe duration

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use depo_model::{ActionCatalog, ActionKind, Recipe, Step, DURATION_COLUMN, ITERATIONS_COLUMN};

/// Maximum loop nesting depth
pub const MAX_LOOP_DEPTH: u8 = 3;

/// Structural (loop nesting) errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StructureError {
    #[error("Step {step}: loop nesting exceeds the maximum depth of {max}")]
    DepthExceeded { step: usize, max: u8 },

    #[error("Step {step}: loop close without a matching loop open")]
    UnmatchedClose { step: usize },

    #[error("Loop opened but never closed (recipe ends at step {step})")]
    UnmatchedOpen { step: usize },

    #[error("Step {step}: unknown action id {action}")]
    UnknownAction { step: usize, action: i16 },
}

/// Timing calculation errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TimingError {
    #[error(transparent)]
    Structure(#[from] StructureError),

    #[error("Step {step}: negative duration {value}")]
    NegativeDuration { step: usize, value: f64 },

    #[error("Step {step}: duration {value} is not a finite number")]
    InvalidDuration { step: usize, value: f64 },

    #[error("Step {step}: long-lasting step has no duration")]
    MissingDuration { step: usize },

    #[error("Step {step}: invalid loop iteration count {value}")]
    InvalidIterations { step: usize, value: f64 },
}

/// What to do with a loop iteration count below 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopCountPolicy {
    /// Treat counts below 1 (and a missing count) as 1
    #[default]
    Clamp,
    /// Reject counts below 1 and missing counts
    Reject,
}

/// Result of a timing calculation
#[derive(Debug, Clone, PartialEq)]
pub struct TimingReport {
    /// Total recipe duration in seconds, loops unrolled
    pub total_seconds: f64,
    /// Start time (seconds) of every step; inside loops, of the first pass
    pub start_times: Vec<f64>,
}

struct OpenLoop {
    iterations: f64,
    body_start: f64,
}

/// Loop nesting validation and timing
#[derive(Debug, Clone)]
pub struct StructureAnalyzer {
    catalog: Arc<ActionCatalog>,
    policy: LoopCountPolicy,
}

impl StructureAnalyzer {
    pub fn new(catalog: Arc<ActionCatalog>, policy: LoopCountPolicy) -> Self {
        Self { catalog, policy }
    }

    pub fn policy(&self) -> LoopCountPolicy {
        self.policy
    }

    fn kind_of(&self, index: usize, step: &Step) -> Result<ActionKind, StructureError> {
        self.catalog
            .get(step.action())
            .map(|def| def.kind)
            .ok_or(StructureError::UnknownAction {
                step: index,
                action: step.action(),
            })
    }

    /// Validate loop nesting and return the nesting level of every step
    ///
    /// A loop open is at the level outside its body; a loop close is back at
    /// that same level.
    pub fn validate(&self, recipe: &Recipe) -> Result<Vec<u8>, StructureError> {
        let mut depth: u8 = 0;
        let mut levels = Vec::with_capacity(recipe.len());

        for (index, step) in recipe.iter().enumerate() {
            match self.kind_of(index, step)? {
                ActionKind::LoopOpen => {
                    levels.push(depth);
                    depth += 1;
                    if depth > MAX_LOOP_DEPTH {
                        return Err(StructureError::DepthExceeded {
                            step: index,
                            max: MAX_LOOP_DEPTH,
                        });
                    }
                },
                ActionKind::LoopClose => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or(StructureError::UnmatchedClose { step: index })?;
                    levels.push(depth);
                },
                ActionKind::Plain => levels.push(depth),
            }
        }

        if depth != 0 {
            return Err(StructureError::UnmatchedOpen {
                step: recipe.len().saturating_sub(1),
            });
        }
        Ok(levels)
    }

    /// Compute per-step start times and the total duration
    pub fn calculate(&self, recipe: &Recipe) -> Result<TimingReport, TimingError> {
        let mut elapsed = 0.0f64;
        let mut loops: Vec<OpenLoop> = Vec::new();
        let mut start_times = Vec::with_capacity(recipe.len());

        for (index, step) in recipe.iter().enumerate() {
            start_times.push(elapsed);

            match self.kind_of(index, step)? {
                ActionKind::LoopOpen => {
                    loops.push(OpenLoop {
                        iterations: self.iterations(index, step)?,
                        body_start: elapsed,
                    });
                },
                ActionKind::LoopClose => {
                    let open = loops
                        .pop()
                        .ok_or(StructureError::UnmatchedClose { step: index })?;
                    let body = elapsed - open.body_start;
                    // The body was already counted once on the way through
                    if open.iterations > 1.0 && body > 0.0 {
                        elapsed += body * (open.iterations - 1.0);
                    }
                },
                ActionKind::Plain if step.is_long_lasting() => {
                    elapsed += Self::duration(index, step)?;
                },
                ActionKind::Plain => {},
            }
        }

        if !loops.is_empty() {
            return Err(StructureError::UnmatchedOpen {
                step: recipe.len().saturating_sub(1),
            }
            .into());
        }

        Ok(TimingReport {
            total_seconds: elapsed,
            start_times,
        })
    }

    /// Iteration count, rounded to the nearest integer (ties away from zero)
    fn iterations(&self, index: usize, step: &Step) -> Result<f64, TimingError> {
        let raw = match step.get(ITERATIONS_COLUMN).and_then(|p| p.as_f64()) {
            Some(value) => value,
            None if self.policy == LoopCountPolicy::Clamp => {
                warn!("Step {}: loop has no iteration count, using 1", index);
                return Ok(1.0);
            },
            None => {
                return Err(TimingError::InvalidIterations {
                    step: index,
                    value: f64::NAN,
                })
            },
        };

        if !raw.is_finite() {
            return Err(TimingError::InvalidIterations {
                step: index,
                value: raw,
            });
        }

        let rounded = raw.round();
        if rounded >= 1.0 {
            return Ok(rounded);
        }
        match self.policy {
            LoopCountPolicy::Clamp => {
                warn!(
                    "Step {}: loop iteration count {} below 1, using 1",
                    index, raw
                );
                Ok(1.0)
            },
            LoopCountPolicy::Reject => Err(TimingError::InvalidIterations {
                step: index,
                value: raw,
            }),
        }
    }

    fn duration(index: usize, step: &Step) -> Result<f64, TimingError> {
        let value = step
            .get(DURATION_COLUMN)
            .and_then(|p| p.as_f64())
            .ok_or(TimingError::MissingDuration { step: index })?;

        if !value.is_finite() {
            return Err(TimingError::InvalidDuration { step: index, value });
        }
        if value < 0.0 {
            return Err(TimingError::NegativeDuration { step: index, value });
        }
        Ok(value)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::test_utils::{context, end_for, for_loop, set_temperature, wait};

    fn analyzer() -> StructureAnalyzer {
        context().analyzer()
    }

    #[test]
    fn test_levels_of_nested_loops() {
        let recipe = Recipe::new(vec![
            set_temperature(100.0),
            for_loop(2),
            wait(1.0),
            for_loop(3),
            wait(1.0),
            end_for(),
            end_for(),
        ]);
        assert_eq!(
            analyzer().validate(&recipe).unwrap(),
            vec![0, 0, 1, 1, 2, 1, 0]
        );
    }

    #[test]
    fn test_depth_three_accepted_depth_four_rejected() {
        let mut steps = vec![for_loop(2), for_loop(2), for_loop(2), wait(1.0)];
        steps.extend([end_for(), end_for(), end_for()]);
        assert!(analyzer().validate(&Recipe::new(steps)).is_ok());

        let mut steps = vec![
            wait(1.0),
            for_loop(2),
            for_loop(2),
            for_loop(2),
            for_loop(2),
            wait(1.0),
        ];
        steps.extend([end_for(), end_for(), end_for(), end_for()]);
        assert_eq!(
            analyzer().validate(&Recipe::new(steps)).unwrap_err(),
            StructureError::DepthExceeded { step: 4, max: 3 }
        );
    }

    #[test]
    fn test_unmatched_close_and_open() {
        let recipe = Recipe::new(vec![wait(1.0), end_for()]);
        assert_eq!(
            analyzer().validate(&recipe).unwrap_err(),
            StructureError::UnmatchedClose { step: 1 }
        );

        let recipe = Recipe::new(vec![for_loop(2), wait(1.0)]);
        assert_eq!(
            analyzer().validate(&recipe).unwrap_err(),
            StructureError::UnmatchedOpen { step: 1 }
        );
    }

    #[test]
    fn test_empty_recipe() {
        let report = analyzer().calculate(&Recipe::empty()).unwrap();
        assert_eq!(report.total_seconds, 0.0);
        assert!(report.start_times.is_empty());
        assert!(analyzer().validate(&Recipe::empty()).unwrap().is_empty());
    }

    #[test]
    fn test_single_loop_total_is_n_times_d() {
        for (n, d) in [(1, 2.5), (4, 2.5), (10, 0.75), (7, 3.0)] {
            let recipe = Recipe::new(vec![for_loop(n), wait(d as f32), end_for()]);
            let report = analyzer().calculate(&recipe).unwrap();
            assert_eq!(report.total_seconds, f64::from(n) * d);
        }
    }

    #[test]
    fn test_nested_loops_total_is_n_times_m_times_d() {
        let recipe = Recipe::new(vec![
            for_loop(3),
            for_loop(4),
            wait(1.5),
            end_for(),
            end_for(),
        ]);
        let report = analyzer().calculate(&recipe).unwrap();
        assert_eq!(report.total_seconds, 3.0 * 4.0 * 1.5);
    }

    #[test]
    fn test_start_times() {
        let recipe = Recipe::new(vec![
            wait(2.0),
            for_loop(3),
            set_temperature(200.0),
            wait(1.0),
            end_for(),
            wait(0.5),
        ]);
        let report = analyzer().calculate(&recipe).unwrap();
        assert_eq!(report.start_times, vec![0.0, 2.0, 2.0, 2.0, 3.0, 5.0]);
        assert_eq!(report.total_seconds, 5.5);
    }

    #[test]
    fn test_negative_duration_rejected() {
        let recipe = Recipe::new(vec![wait(1.0), wait(-1.0)]);
        assert!(matches!(
            analyzer().calculate(&recipe),
            Err(TimingError::NegativeDuration { step: 1, .. })
        ));
    }

    #[test]
    fn test_zero_iterations_follow_policy() {
        let recipe = Recipe::new(vec![for_loop(0), wait(2.0), end_for()]);
        let clamp = analyzer();
        assert_eq!(clamp.calculate(&recipe).unwrap().total_seconds, 2.0);

        let ctx = context();
        let reject = StructureAnalyzer::new(ctx.catalog.clone(), LoopCountPolicy::Reject);
        assert!(matches!(
            reject.calculate(&recipe),
            Err(TimingError::InvalidIterations { step: 0, .. })
        ));
    }

    #[test]
    fn test_calculate_reports_unmatched_open() {
        let recipe = Recipe::new(vec![for_loop(2), wait(1.0)]);
        assert_eq!(
            analyzer().calculate(&recipe).unwrap_err(),
            TimingError::Structure(StructureError::UnmatchedOpen { step: 1 })
        );
    }
}
