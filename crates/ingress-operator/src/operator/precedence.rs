//! Which source owns a key when both kinds carry the same namespace/name.
//!
//! The Voyager CRD wins; a native `Ingress` with the same key is shadowed.

use super::store::ResourceStore;
use super::types::{ObjectKey, Result};
use std::sync::Arc;

pub trait SourcePrecedence: Send + Sync {
    /// Whether another source owns `key`.
    fn is_shadowed(&self, key: &ObjectKey) -> Result<bool>;
}

/// Shadowed whenever the preferred kind's cache holds the key
pub struct ShadowedBy<K> {
    preferred: Arc<dyn ResourceStore<K>>,
}

impl<K> ShadowedBy<K> {
    pub fn new(preferred: Arc<dyn ResourceStore<K>>) -> Self {
        Self { preferred }
    }
}

impl<K: Send + Sync> SourcePrecedence for ShadowedBy<K> {
    fn is_shadowed(&self, key: &ObjectKey) -> Result<bool> {
        Ok(self.preferred.get_by_key(key)?.is_some())
    }
}
