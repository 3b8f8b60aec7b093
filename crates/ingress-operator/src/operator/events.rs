//! Kubernetes Event recording
//!
//! Events are fire-and-forget: a failed publish is logged and never fails the
//! caller.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Reason attached to events about ingresses that fail validation
pub const REASON_INGRESS_INVALID: &str = "IngressInvalid";

const ACTION_VALIDATE: &str = "Validate";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventRecorder: Send + Sync {
    /// Publish a `Warning` event on the referenced object.
    async fn warning(&self, object_ref: &ObjectReference, reason: &str, message: &str);
}

/// Production recorder wrapping `kube::runtime::events::Recorder`
pub struct KubeEventRecorder {
    recorder: Recorder,
}

impl KubeEventRecorder {
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventRecorder for KubeEventRecorder {
    async fn warning(&self, object_ref: &ObjectReference, reason: &str, message: &str) {
        let event = Event {
            type_: EventType::Warning,
            reason: reason.to_string(),
            note: Some(message.to_string()),
            action: ACTION_VALIDATE.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, object_ref).await {
            warn!(
                reason,
                object = ?object_ref.name,
                error = %e,
                "Failed to publish Kubernetes event"
            );
        }
    }
}

/// Recorder that drops every event
pub struct NoopEventRecorder;

#[async_trait]
impl EventRecorder for NoopEventRecorder {
    async fn warning(&self, _object_ref: &ObjectReference, _reason: &str, _message: &str) {}
}
