//! Finalizer patching against the live API object.

use super::types::{Error, ObjectKey, Result};
use crate::canonical::{FinalizerOp, FinalizerSet};
use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::fmt::Debug;
use std::marker::PhantomData;
use tracing::debug;

/// Result of a finalizer patch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    /// Finalizers on the object after the patch
    pub finalizers: FinalizerSet,
    /// Whether a write was issued
    pub changed: bool,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FinalizerPatcher: Send + Sync {
    /// Apply `op` to the finalizers of the object at `key`.
    ///
    /// The write is skipped when the set already has the desired shape, and a
    /// missing object counts as converged.
    async fn patch_finalizers(&self, key: &ObjectKey, op: FinalizerOp) -> Result<PatchOutcome>;
}

/// Read-modify-write finalizer patcher guarded by `resourceVersion`
pub struct KubeFinalizerPatcher<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeFinalizerPatcher<K> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

impl<K> KubeFinalizerPatcher<K>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + DeserializeOwned
        + Debug,
{
    fn api(&self, key: &ObjectKey) -> Result<Api<K>> {
        let namespace = key
            .namespace
            .as_deref()
            .ok_or_else(|| Error::InvalidKey(key.to_string()))?;
        Ok(Api::namespaced(self.client.clone(), namespace))
    }
}

#[async_trait]
impl<K> FinalizerPatcher for KubeFinalizerPatcher<K>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + DeserializeOwned
        + Debug
        + Send
        + Sync
        + 'static,
{
    async fn patch_finalizers(&self, key: &ObjectKey, op: FinalizerOp) -> Result<PatchOutcome> {
        let api = self.api(key)?;

        let Some(current) = api.get_opt(&key.name).await? else {
            debug!(%key, %op, "Object is gone, nothing to patch");
            return Ok(PatchOutcome {
                finalizers: FinalizerSet::default(),
                changed: false,
            });
        };

        let meta = current.meta();
        let mut finalizers = FinalizerSet::from_metadata(meta.finalizers.as_ref());
        if !op.apply(&mut finalizers) {
            return Ok(PatchOutcome {
                finalizers,
                changed: false,
            });
        }

        let patch = json!({
            "metadata": {
                "finalizers": finalizers.as_slice(),
                "resourceVersion": meta.resource_version,
            }
        });
        api.patch(&key.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;

        debug!(%key, %op, "Patched finalizers");
        Ok(PatchOutcome {
            finalizers,
            changed: true,
        })
    }
}
