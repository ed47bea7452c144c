//! Shared fixtures for recipesrv integration tests

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
#![allow(dead_code)]

use depo_model::{Property, Recipe, Step};
use recipesrv::{RecipeContext, RecipeSrvConfig};

pub const SAMPLE: &str = include_str!("../../config/recipesrv.yaml");

/// Context from the sample configuration
pub fn context() -> RecipeContext {
    context_from(SAMPLE)
}

/// Context from an edited copy of the sample configuration
pub fn context_from(yaml: &str) -> RecipeContext {
    RecipeSrvConfig::from_yaml_str(yaml)
        .unwrap()
        .build_context()
        .unwrap()
}

pub fn step(ctx: &RecipeContext, action: i16, values: &[(&str, Property)]) -> Step {
    let mut scaffold = Step::builder(ctx.catalog.get(action).unwrap());
    for (key, value) in values {
        assert!(scaffold.set(key, value.clone()), "{key} not applicable");
    }
    scaffold.build()
}

/// A recipe touching every mapped column, with one loop
pub fn sample_recipe(ctx: &RecipeContext) -> Recipe {
    Recipe::new(vec![
        step(ctx, 1, &[("valve_open", Property::boolean(true))]),
        step(
            ctx,
            2,
            &[
                ("temperature", Property::float32(350.5)),
                ("comment", Property::string("ramp up").unwrap()),
            ],
        ),
        step(ctx, 10, &[("iterations", Property::int16(4))]),
        step(ctx, 4, &[("gas_flow", Property::float32(12.25))]),
        step(ctx, 3, &[("duration", Property::float32(30.0))]),
        step(ctx, 11, &[]),
        step(ctx, 1, &[("valve_open", Property::boolean(false))]),
    ])
}

/// `rows` alternating valve and wait steps
pub fn long_recipe(ctx: &RecipeContext, rows: usize) -> Recipe {
    let steps = (0..rows)
        .map(|i| {
            if i % 2 == 0 {
                step(ctx, 1, &[("valve_open", Property::boolean(i % 4 == 0))])
            } else {
                step(ctx, 3, &[("duration", Property::float32(i as f32 * 0.5))])
            }
        })
        .collect();
    Recipe::new(steps)
}

/// Same recipe with the unmapped columns dropped, as read back from the controller
pub fn without_unmapped(ctx: &RecipeContext, recipe: &Recipe) -> Recipe {
    let steps = recipe
        .steps()
        .iter()
        .map(|s| {
            let mut scaffold = Step::builder(ctx.catalog.get(s.action()).unwrap());
            for (key, value) in s.properties() {
                if ctx.layout.is_mapped(key.as_str()) {
                    scaffold.set(key.as_str(), value.clone());
                }
            }
            scaffold.build()
        })
        .collect();
    Recipe::new(steps)
}
