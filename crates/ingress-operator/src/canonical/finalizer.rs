//! Typed finalizer set operations, independent of how they are persisted.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered, duplicate-free list of finalizers as stored in object metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FinalizerSet(Vec<String>);

impl FinalizerSet {
    /// Build a set from raw metadata, dropping duplicate entries.
    pub fn from_metadata(raw: Option<&Vec<String>>) -> Self {
        let mut set = Self::default();
        for finalizer in raw.into_iter().flatten() {
            set.add(finalizer);
        }
        set
    }

    pub fn contains(&self, finalizer: &str) -> bool {
        self.0.iter().any(|f| f == finalizer)
    }

    /// Returns `true` when the set changed.
    pub fn add(&mut self, finalizer: &str) -> bool {
        if self.contains(finalizer) {
            return false;
        }
        self.0.push(finalizer.to_string());
        true
    }

    /// Returns `true` when the set changed.
    pub fn remove(&mut self, finalizer: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|f| f != finalizer);
        before != self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

/// A single change to a finalizer set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizerOp {
    Add(String),
    Remove(String),
}

impl FinalizerOp {
    /// Apply to `set`, returning `true` when the set changed.
    pub fn apply(&self, set: &mut FinalizerSet) -> bool {
        match self {
            Self::Add(finalizer) => set.add(finalizer),
            Self::Remove(finalizer) => set.remove(finalizer),
        }
    }
}

impl fmt::Display for FinalizerOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add(finalizer) => write!(f, "add finalizer {finalizer}"),
            Self::Remove(finalizer) => write!(f, "remove finalizer {finalizer}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "voyager.appscode.com";

    #[test]
    fn add_is_idempotent() {
        let mut once = FinalizerSet::default();
        FinalizerOp::Add(TOKEN.to_string()).apply(&mut once);

        let mut twice = FinalizerSet::default();
        assert!(FinalizerOp::Add(TOKEN.to_string()).apply(&mut twice));
        assert!(!FinalizerOp::Add(TOKEN.to_string()).apply(&mut twice));

        assert_eq!(once, twice);
        assert_eq!(twice.as_slice(), &[TOKEN.to_string()]);
    }

    #[test]
    fn remove_keeps_foreign_finalizers_in_order() {
        let raw = vec![
            "foregroundDeletion".to_string(),
            TOKEN.to_string(),
            "example.com/keep".to_string(),
        ];
        let mut set = FinalizerSet::from_metadata(Some(&raw));

        assert!(set.remove(TOKEN));
        assert!(!set.remove(TOKEN));
        assert_eq!(
            set.into_vec(),
            vec!["foregroundDeletion".to_string(), "example.com/keep".to_string()]
        );
    }

    #[test]
    fn from_metadata_collapses_duplicates() {
        let raw = vec![TOKEN.to_string(), TOKEN.to_string()];
        let set = FinalizerSet::from_metadata(Some(&raw));
        assert_eq!(set.as_slice().len(), 1);
        assert!(FinalizerSet::from_metadata(None).is_empty());
    }
}
