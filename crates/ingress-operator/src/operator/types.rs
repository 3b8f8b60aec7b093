use kube::runtime::reflector::{Lookup, ObjectRef};
use kube::{Resource, ResourceExt};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Finalizer recorded on every ingress whose infrastructure needs teardown
pub const FINALIZER_TOKEN: &str = "voyager.appscode.com";

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Invalid object key {0:?}")]
    InvalidKey(String),

    #[error("Object has no name")]
    MissingObjectKey,

    #[error("Delegate {operation} failed: {source}")]
    DelegateError {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Namespace/name identity of a logical ingress, stable across both source kinds
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: Option<String>, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }

    pub fn namespaced(namespace: &str, name: &str) -> Self {
        Self::new(Some(namespace.to_string()), name)
    }

    pub fn for_resource<K: Resource>(obj: &K) -> Result<Self> {
        let name = obj.meta().name.clone().ok_or(Error::MissingObjectKey)?;
        Ok(Self::new(ResourceExt::namespace(obj), name))
    }

    pub fn object_ref<K>(&self) -> ObjectRef<K>
    where
        K: Resource<DynamicType = ()>,
    {
        let object_ref = ObjectRef::new(&self.name);
        match &self.namespace {
            Some(namespace) => object_ref.within(namespace),
            None => object_ref,
        }
    }
}

impl<K: Lookup + ?Sized> From<&ObjectRef<K>> for ObjectKey {
    fn from(object_ref: &ObjectRef<K>) -> Self {
        Self::new(object_ref.namespace.clone(), object_ref.name.clone())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{namespace}/{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for ObjectKey {
    type Err = Error;

    fn from_str(key: &str) -> Result<Self> {
        let invalid = || Error::InvalidKey(key.to_string());
        match key.split('/').collect::<Vec<_>>().as_slice() {
            [name] if !name.is_empty() => Ok(Self::new(None, *name)),
            [namespace, name] if !namespace.is_empty() && !name.is_empty() => {
                Ok(Self::namespaced(namespace, name))
            }
            _ => Err(invalid()),
        }
    }
}
