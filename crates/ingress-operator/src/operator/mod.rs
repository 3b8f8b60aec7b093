use crate::adapter::{CrdAdapter, NativeAdapter};
use crate::crds::VoyagerIngress;
use k8s_openapi::api::networking::v1::Ingress;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

pub mod config;
pub mod controller;
pub mod delegate;
pub mod events;
pub mod filter;
pub mod patch;
pub mod pipeline;
pub mod precedence;
pub mod reconciler;
pub mod store;
pub mod trigger;
pub mod types;
pub mod watch;

// Re-export commonly used items
pub use config::OperatorConfig;
pub use controller::{run_controller, ControllerContext, RetryBudget};
pub use delegate::{DelegateFactory, DryRunDelegateFactory, IngressDelegate};
pub use events::{EventRecorder, KubeEventRecorder};
pub use filter::{ChangeFilter, FilterDecision};
pub use patch::{FinalizerPatcher, KubeFinalizerPatcher, PatchOutcome};
pub use pipeline::Pipeline;
pub use reconciler::{LifecycleState, Reconciler};
pub use store::ResourceStore;
pub use trigger::{KeyTrigger, ReconcileTrigger};
pub use types::{Error, ObjectKey, Result};

use precedence::ShadowedBy;

/// Shared dependencies, built once at startup
#[derive(Clone)]
pub struct OperatorContext {
    pub client: Client,
    pub config: Arc<OperatorConfig>,
    pub recorder: Arc<dyn EventRecorder>,
    pub delegates: Arc<dyn DelegateFactory>,
}

impl OperatorContext {
    /// API handle honoring the configured watch namespace
    pub fn api<K>(&self) -> Api<K>
    where
        K: Resource<DynamicType = (), Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + DeserializeOwned
            + std::fmt::Debug,
    {
        match &self.config.watch_namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        }
    }
}

/// Main entry point: run the CRD pipeline and, when enabled, the native
/// Ingress pipeline until `shutdown` fires.
#[instrument(skip_all, fields(ingress_class = %config.ingress_class, cloud_provider = %config.cloud_provider))]
pub async fn run_operator(
    client: Client,
    config: OperatorConfig,
    delegates: Arc<dyn DelegateFactory>,
    shutdown: CancellationToken,
) -> Result<()> {
    if let Err(validation_error) = config.validate() {
        error!("Configuration validation failed: {}", validation_error);
        return Err(Error::ConfigError(validation_error.to_string()));
    }

    let recorder = Arc::new(KubeEventRecorder::new(client.clone(), &config.controller_name));
    let context = OperatorContext {
        client: client.clone(),
        config: Arc::new(config),
        recorder,
        delegates,
    };

    let mut crd_pipeline = Pipeline::new(
        &context,
        CrdAdapter,
        Arc::new(KubeFinalizerPatcher::<VoyagerIngress>::new(client.clone())),
    );

    let mut handles = Vec::new();
    if context.config.watch_native_ingress {
        let native_pipeline = Pipeline::new(
            &context,
            NativeAdapter,
            Arc::new(KubeFinalizerPatcher::<Ingress>::new(client.clone())),
        )
        .with_precedence(Arc::new(ShadowedBy::<VoyagerIngress>::new(Arc::new(
            crd_pipeline.store(),
        ))));
        // A Voyager Ingress appearing or going away changes who owns the key.
        crd_pipeline = crd_pipeline.with_sibling(native_pipeline.retrigger());

        handles.push(tokio::spawn(
            native_pipeline.run(context.api::<Ingress>(), shutdown.clone()),
        ));
    } else {
        info!("Native Ingress watch disabled");
    }
    handles.push(tokio::spawn(
        crd_pipeline.run(context.api::<VoyagerIngress>(), shutdown.clone()),
    ));

    for handle in handles {
        if let Err(e) = handle.await {
            error!("Pipeline task join error: {:?}", e);
        }
    }

    info!("Ingress operator shutting down");
    Ok(())
}
