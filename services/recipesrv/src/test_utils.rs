//! Test fixtures built from the sample configuration
//!
//! ```rust,ignore
//! use crate::test_utils::{context, for_loop, wait, end_for};
//!
//! let recipe = Recipe::new(vec![for_loop(3), wait(1.0), end_for()]);
//! let report = context().analyzer().calculate(&recipe).unwrap();
//! ```

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::sync::OnceLock;

use depo_model::{Property, Step};

use crate::config::{RecipeContext, RecipeSrvConfig};

const SAMPLE: &str = include_str!("../config/recipesrv.yaml");

/// Context built from `config/recipesrv.yaml`
pub fn context() -> RecipeContext {
    static CONTEXT: OnceLock<RecipeContext> = OnceLock::new();
    CONTEXT
        .get_or_init(|| {
            RecipeSrvConfig::from_yaml_str(SAMPLE)
                .unwrap()
                .build_context()
                .unwrap()
        })
        .clone()
}

fn step(action: i16, value: Option<(&str, Property)>) -> Step {
    let ctx = context();
    let definition = ctx.catalog.get(action).unwrap();
    let mut scaffold = Step::builder(definition);
    if let Some((key, property)) = value {
        assert!(scaffold.set(key, property), "{key} not applicable");
    }
    scaffold.build()
}

pub fn open_valve(open: bool) -> Step {
    step(1, Some(("valve_open", Property::boolean(open))))
}

pub fn set_temperature(celsius: f32) -> Step {
    step(2, Some(("temperature", Property::float32(celsius))))
}

pub fn wait(seconds: f32) -> Step {
    step(3, Some(("duration", Property::float32(seconds))))
}

pub fn set_flow(sccm: f32) -> Step {
    step(4, Some(("gas_flow", Property::float32(sccm))))
}

pub fn for_loop(iterations: i16) -> Step {
    step(10, Some(("iterations", Property::int16(iterations))))
}

pub fn end_for() -> Step {
    step(11, None)
}
