//! Watch event filtering: only valid, actually-changed objects reach the controller.

use super::events::{EventRecorder, REASON_INGRESS_INVALID};
use super::trigger::ReconcileTrigger;
use crate::adapter::SchemaAdapter;
use crate::canonical::{diff, validation, CanonicalIngress};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a filter did with one watch event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    Enqueued(String),
    Unchanged,
    Invalid,
    ConversionFailed,
}

pub struct ChangeFilter<A: SchemaAdapter> {
    adapter: Arc<A>,
    trigger: ReconcileTrigger<A::Source>,
    recorder: Arc<dyn EventRecorder>,
    cloud_provider: String,
}

impl<A: SchemaAdapter> ChangeFilter<A> {
    pub fn new(
        adapter: Arc<A>,
        trigger: ReconcileTrigger<A::Source>,
        recorder: Arc<dyn EventRecorder>,
        cloud_provider: impl Into<String>,
    ) -> Self {
        Self {
            adapter,
            trigger,
            recorder,
            cloud_provider: cloud_provider.into(),
        }
    }

    pub async fn on_add(&self, raw: &A::Source) -> FilterDecision {
        let Some(ingress) = self.canonicalize(raw) else {
            return FilterDecision::ConversionFailed;
        };
        self.admit(raw, &ingress).await
    }

    pub async fn on_update(&self, raw_old: &A::Source, raw_new: &A::Source) -> FilterDecision {
        let Some(new) = self.canonicalize(raw_new) else {
            return FilterDecision::ConversionFailed;
        };

        // An old snapshot we could not read tells us nothing; treat as a change.
        if let Ok(old) = self.adapter.to_canonical(raw_old) {
            let delta = diff::diff(&old, &new);
            if !delta.changed {
                debug!(kind = A::KIND, key = %new.key(), "No meaningful change, skipping");
                return FilterDecision::Unchanged;
            }
            info!(kind = A::KIND, key = %new.key(), diff = %delta, "Ingress has changed");
        }

        self.admit(raw_new, &new).await
    }

    fn canonicalize(&self, raw: &A::Source) -> Option<CanonicalIngress> {
        match self.adapter.to_canonical(raw) {
            Ok(ingress) => Some(ingress),
            Err(e) => {
                warn!(kind = A::KIND, error = %e, "Dropping event that failed conversion");
                None
            }
        }
    }

    async fn admit(&self, raw: &A::Source, ingress: &CanonicalIngress) -> FilterDecision {
        if let Err(e) = validation::validate(ingress, &self.cloud_provider) {
            warn!(kind = A::KIND, key = %ingress.key(), error = %e, "Ingress is invalid");
            self.recorder
                .warning(
                    &self.adapter.object_ref(raw),
                    REASON_INGRESS_INVALID,
                    &format!("Reason: {e}"),
                )
                .await;
            return FilterDecision::Invalid;
        }

        self.trigger.send(raw.clone());
        FilterDecision::Enqueued(ingress.key().to_string())
    }
}
