//! Per-key finalizer/deletion state machine.
//!
//! Every pass rebuilds the canonical ingress from the cache, so coalesced
//! triggers always act on the latest snapshot.

use super::delegate::{DelegateFactory, IngressDelegate};
use super::patch::FinalizerPatcher;
use super::precedence::SourcePrecedence;
use super::store::ResourceStore;
use super::types::{Error, ObjectKey, Result, FINALIZER_TOKEN};
use crate::adapter::SchemaAdapter;
use crate::canonical::{CanonicalIngress, FinalizerOp};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Lifecycle position of one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Absent,
    Terminating { finalizer: bool },
    Active { finalizer: bool },
}

impl LifecycleState {
    pub fn of(ingress: Option<&CanonicalIngress>) -> Self {
        match ingress {
            None => Self::Absent,
            Some(ing) if ing.is_terminating() => Self::Terminating {
                finalizer: ing.has_finalizer(FINALIZER_TOKEN),
            },
            Some(ing) => Self::Active {
                finalizer: ing.has_finalizer(FINALIZER_TOKEN),
            },
        }
    }
}

pub struct Reconciler<A: SchemaAdapter> {
    adapter: Arc<A>,
    store: Arc<dyn ResourceStore<A::Source>>,
    patcher: Arc<dyn FinalizerPatcher>,
    delegates: Arc<dyn DelegateFactory>,
    ingress_class: String,
    precedence: Option<Arc<dyn SourcePrecedence>>,
}

impl<A: SchemaAdapter> Reconciler<A> {
    pub fn new(
        adapter: Arc<A>,
        store: Arc<dyn ResourceStore<A::Source>>,
        patcher: Arc<dyn FinalizerPatcher>,
        delegates: Arc<dyn DelegateFactory>,
        ingress_class: impl Into<String>,
    ) -> Self {
        Self {
            adapter,
            store,
            patcher,
            delegates,
            ingress_class: ingress_class.into(),
            precedence: None,
        }
    }

    /// Yield keys that another source owns.
    #[must_use]
    pub fn with_precedence(mut self, precedence: Arc<dyn SourcePrecedence>) -> Self {
        self.precedence = Some(precedence);
        self
    }

    #[instrument(skip(self), fields(kind = A::KIND))]
    pub async fn reconcile(&self, key: &str) -> Result<()> {
        let object_key: ObjectKey = match key.parse() {
            Ok(object_key) => object_key,
            Err(e) => {
                error!(error = %e, "Dropping unparsable key");
                return Ok(());
            }
        };

        let Some(raw) = self.store.get_by_key(&object_key)? else {
            debug!("Ingress does not exist anymore");
            return Ok(());
        };

        let ingress = match self.adapter.to_canonical(&raw) {
            Ok(ingress) => ingress,
            Err(e) => {
                error!(error = %e, "Dropping key that failed conversion");
                return Ok(());
            }
        };

        if let Some(precedence) = &self.precedence {
            if precedence.is_shadowed(&object_key)? {
                return self.release_shadowed(&object_key, &ingress).await;
            }
        }

        let delegate = self.delegates.for_ingress(&ingress);
        match LifecycleState::of(Some(&ingress)) {
            LifecycleState::Absent | LifecycleState::Terminating { finalizer: false } => Ok(()),
            LifecycleState::Terminating { finalizer: true } => {
                info!("Deleting ingress");
                delegate.delete().await.map_err(|source| Error::DelegateError {
                    operation: "delete",
                    source,
                })?;
                self.patch(&object_key, FinalizerOp::Remove(FINALIZER_TOKEN.to_string()))
                    .await
            }
            LifecycleState::Active { finalizer } => {
                self.sync_finalizer(&object_key, finalizer, delegate.firewall_supported())
                    .await?;
                self.dispatch(&ingress, delegate.as_ref()).await
            }
        }
    }

    async fn sync_finalizer(&self, key: &ObjectKey, present: bool, supported: bool) -> Result<()> {
        let op = match (present, supported) {
            (false, true) => FinalizerOp::Add(FINALIZER_TOKEN.to_string()),
            (true, false) => FinalizerOp::Remove(FINALIZER_TOKEN.to_string()),
            _ => return Ok(()),
        };
        self.patch(key, op).await
    }

    async fn dispatch(&self, ingress: &CanonicalIngress, delegate: &dyn IngressDelegate) -> Result<()> {
        if ingress.should_handle(&self.ingress_class) {
            info!("Sync/Add/Update for ingress");
            return delegate.reconcile().await.map_err(|source| Error::DelegateError {
                operation: "reconcile",
                source,
            });
        }

        info!(
            class = ingress.ingress_class.as_deref().unwrap_or_default(),
            "Ingress does not match ingress class, tearing down"
        );
        if let Err(e) = delegate.delete().await {
            warn!(error = %e, "Teardown of foreign-class ingress failed");
        }
        Ok(())
    }

    async fn release_shadowed(&self, key: &ObjectKey, ingress: &CanonicalIngress) -> Result<()> {
        info!("Shadowed by a Voyager Ingress with the same key, skipping");
        if ingress.has_finalizer(FINALIZER_TOKEN) {
            return self
                .patch(key, FinalizerOp::Remove(FINALIZER_TOKEN.to_string()))
                .await;
        }
        Ok(())
    }

    async fn patch(&self, key: &ObjectKey, op: FinalizerOp) -> Result<()> {
        let outcome = self.patcher.patch_finalizers(key, op).await?;
        if outcome.changed {
            debug!(finalizers = ?outcome.finalizers, "Finalizers updated");
        }
        Ok(())
    }
}
