//! Schema adapters
//!
//! Each watched resource kind gets one adapter that turns its raw object into
//! a [`CanonicalIngress`]. Everything downstream of the adapter (filtering,
//! queuing, reconciliation) is generic over this trait.

pub mod crd;
pub mod native;

use crate::canonical::CanonicalIngress;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use thiserror::Error;

pub use crd::CrdAdapter;
pub use native::NativeAdapter;

/// Raw object could not be mapped onto the canonical shape
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("{kind} has no name")]
    MissingName { kind: &'static str },

    #[error("{kind} {key} {field} uses a resource backend, only service backends are supported")]
    ResourceBackend {
        kind: &'static str,
        key: String,
        field: String,
    },

    #[error("{kind} {key} {field} has no service port")]
    MissingServicePort {
        kind: &'static str,
        key: String,
        field: String,
    },
}

/// Converts one source resource kind into the canonical ingress model
pub trait SchemaAdapter: Send + Sync + 'static {
    type Source: Resource<DynamicType = ()>
        + Clone
        + Debug
        + DeserializeOwned
        + Serialize
        + Send
        + Sync
        + 'static;

    /// Short kind label used in logs
    const KIND: &'static str;

    fn to_canonical(&self, source: &Self::Source) -> Result<CanonicalIngress, ConversionError>;

    /// Reference to the raw object, for events about it
    fn object_ref(&self, source: &Self::Source) -> ObjectReference {
        source.object_ref(&())
    }
}
