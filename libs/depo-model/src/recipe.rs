//! Recipe and step values
//!
//! Recipes are immutable: every edit produces a new [`Recipe`]. Steps are
//! assembled through a [`StepScaffold`] which only accepts the columns the
//! step's action declares applicable.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::action::{ActionDefinition, DurationClass};
use crate::column::{ColumnKey, ACTION_COLUMN};
use crate::property::{Property, PropertyValue};

/// One recipe row
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    action: i16,
    duration: DurationClass,
    properties: BTreeMap<ColumnKey, Property>,
}

impl Step {
    /// Start a step for the given action
    pub fn builder(action: &ActionDefinition) -> StepScaffold<'_> {
        StepScaffold {
            definition: action,
            properties: BTreeMap::new(),
        }
    }

    pub fn action(&self) -> i16 {
        self.action
    }

    pub fn duration_class(&self) -> DurationClass {
        self.duration
    }

    pub fn is_long_lasting(&self) -> bool {
        self.duration == DurationClass::LongLasting
    }

    pub fn get(&self, key: &str) -> Option<&Property> {
        self.properties.get(key)
    }

    /// Properties in key order, excluding the action id
    pub fn properties(&self) -> impl Iterator<Item = (&ColumnKey, &Property)> {
        self.properties.iter()
    }
}

/// Step under construction, bound to one action definition
#[derive(Debug)]
pub struct StepScaffold<'a> {
    definition: &'a ActionDefinition,
    properties: BTreeMap<ColumnKey, Property>,
}

impl StepScaffold<'_> {
    /// Whether the action declares the column applicable
    pub fn accepts(&self, key: &str) -> bool {
        key != ACTION_COLUMN && self.definition.is_applicable(key)
    }

    /// Set a property; returns false (and drops the value) when the column is
    /// not applicable to this action
    ///
    /// An empty string is stored as absent, so empty and missing text cells
    /// compare equal.
    pub fn set(&mut self, key: &str, value: Property) -> bool {
        if !self.accepts(key) {
            return false;
        }
        if matches!(value.value(), PropertyValue::String(s) if s.is_empty()) {
            self.properties.remove(key);
        } else {
            self.properties.insert(ColumnKey::from(key), value);
        }
        true
    }

    /// Chained form of [`StepScaffold::set`]
    pub fn with(mut self, key: &str, value: Property) -> Self {
        self.set(key, value);
        self
    }

    pub fn build(self) -> Step {
        Step {
            action: self.definition.id,
            duration: self.definition.duration,
            properties: self.properties,
        }
    }
}

/// Ordered, immutable sequence of steps
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    steps: Arc<[Step]>,
}

impl Recipe {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Step> {
        self.steps.iter()
    }
}

impl Default for Recipe {
    fn default() -> Self {
        Self::empty()
    }
}

impl FromIterator<Step> for Recipe {
    fn from_iter<I: IntoIterator<Item = Step>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Recipe {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}
