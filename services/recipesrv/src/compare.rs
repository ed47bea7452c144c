//! Structural recipe comparison
//!
//! Pure function over two in-memory recipes, used to verify a send by
//! comparing the sent recipe with the one read back from the controller.

use std::collections::BTreeSet;
use std::fmt;

use depo_model::{ColumnKey, Property, Recipe};

/// One difference between two recipes
#[derive(Debug, Clone, PartialEq)]
pub enum Difference {
    RowCount {
        expected: usize,
        actual: usize,
    },
    Action {
        row: usize,
        expected: i16,
        actual: i16,
    },
    Property {
        row: usize,
        key: ColumnKey,
        expected: Option<Property>,
        actual: Option<Property>,
    },
}

fn show(value: &Option<Property>) -> String {
    value
        .as_ref()
        .map_or_else(|| "<none>".to_string(), Property::format)
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RowCount { expected, actual } => {
                write!(f, "row count: expected {expected}, got {actual}")
            },
            Self::Action {
                row,
                expected,
                actual,
            } => write!(f, "row {row}: action expected {expected}, got {actual}"),
            Self::Property {
                row,
                key,
                expected,
                actual,
            } => write!(
                f,
                "row {row}: '{key}' expected {}, got {}",
                show(expected),
                show(actual)
            ),
        }
    }
}

/// Compares recipes step by step
#[derive(Debug, Clone, Default)]
pub struct RecipeComparator {
    /// Restrict property comparison to these columns; `None` compares all
    scope: Option<BTreeSet<ColumnKey>>,
}

impl RecipeComparator {
    /// Compare every property
    pub fn all() -> Self {
        Self::default()
    }

    /// Compare only the given columns
    pub fn scoped<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<ColumnKey>,
    {
        Self {
            scope: Some(keys.into_iter().map(Into::into).collect()),
        }
    }

    fn in_scope(&self, key: &ColumnKey) -> bool {
        match &self.scope {
            Some(scope) => scope.contains(key),
            None => true,
        }
    }

    /// Every difference between `expected` and `actual`, in row order
    ///
    /// Rows are compared up to the shorter recipe's length; a length
    /// difference is reported first.
    pub fn compare(&self, expected: &Recipe, actual: &Recipe) -> Vec<Difference> {
        let mut differences = Vec::new();

        if expected.len() != actual.len() {
            differences.push(Difference::RowCount {
                expected: expected.len(),
                actual: actual.len(),
            });
        }

        for (row, (e, a)) in expected.iter().zip(actual.iter()).enumerate() {
            if e.action() != a.action() {
                differences.push(Difference::Action {
                    row,
                    expected: e.action(),
                    actual: a.action(),
                });
                continue;
            }

            let keys: BTreeSet<&ColumnKey> = e
                .properties()
                .chain(a.properties())
                .map(|(k, _)| k)
                .filter(|k| self.in_scope(k))
                .collect();

            for key in keys {
                let (ev, av) = (e.get(key.as_str()), a.get(key.as_str()));
                if ev != av {
                    differences.push(Difference::Property {
                        row,
                        key: key.clone(),
                        expected: ev.cloned(),
                        actual: av.cloned(),
                    });
                }
            }
        }

        differences
    }

    pub fn is_equal(&self, expected: &Recipe, actual: &Recipe) -> bool {
        self.compare(expected, actual).is_empty()
    }
}
