//! Target availability

use ahash::AHashSet;

/// Answers whether a hardware target referenced by an action still exists
pub trait TargetChecker: Send + Sync {
    fn target_exists(&self, name: &str) -> bool;
}

/// Fixed set of available target names
#[derive(Debug, Clone, Default)]
pub struct TargetSet(AHashSet<String>);

impl TargetSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>) {
        self.0.insert(name.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TargetChecker for TargetSet {
    fn target_exists(&self, name: &str) -> bool {
        self.0.contains(name)
    }
}

impl<S: Into<String>> FromIterator<S> for TargetSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
