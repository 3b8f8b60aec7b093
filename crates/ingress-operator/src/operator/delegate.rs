//! Boundary to the controller that provisions load balancer infrastructure.

use crate::canonical::annotations::LbType;
use crate::canonical::CanonicalIngress;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Providers where a `HostPort` ingress manages node firewall rules
const FIREWALL_PROVIDERS: &[&str] = &["aws", "gce", "gke"];

/// Business controller for a single canonical ingress
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IngressDelegate: Send + Sync {
    /// Converge provisioned infrastructure with the ingress.
    async fn reconcile(&self) -> anyhow::Result<()>;

    /// Tear down everything provisioned for the ingress.
    async fn delete(&self) -> anyhow::Result<()>;

    /// Whether teardown needs cloud firewall cleanup, which requires the
    /// ingress to be protected by a finalizer.
    fn firewall_supported(&self) -> bool;
}

/// Builds a delegate bound to one canonical ingress
#[cfg_attr(test, mockall::automock)]
pub trait DelegateFactory: Send + Sync {
    fn for_ingress(&self, ingress: &CanonicalIngress) -> Arc<dyn IngressDelegate>;
}

/// Whether an ingress of this shape needs firewall cleanup on `cloud_provider`.
pub fn firewall_supported(ingress: &CanonicalIngress, cloud_provider: &str) -> bool {
    matches!(ingress.lb_type(), Ok(LbType::HostPort))
        && FIREWALL_PROVIDERS.contains(&cloud_provider)
}

/// Delegate factory that only logs the actions it would take
#[derive(Debug, Clone)]
pub struct DryRunDelegateFactory {
    cloud_provider: String,
}

impl DryRunDelegateFactory {
    pub fn new(cloud_provider: impl Into<String>) -> Self {
        Self {
            cloud_provider: cloud_provider.into(),
        }
    }
}

impl DelegateFactory for DryRunDelegateFactory {
    fn for_ingress(&self, ingress: &CanonicalIngress) -> Arc<dyn IngressDelegate> {
        Arc::new(DryRunDelegate {
            key: ingress.key().to_string(),
            lb_type: ingress.lb_type().unwrap_or_default(),
            firewall: firewall_supported(ingress, &self.cloud_provider),
        })
    }
}

struct DryRunDelegate {
    key: String,
    lb_type: LbType,
    firewall: bool,
}

#[async_trait]
impl IngressDelegate for DryRunDelegate {
    async fn reconcile(&self) -> anyhow::Result<()> {
        info!(key = %self.key, lb_type = %self.lb_type, "Dry run: would reconcile load balancer");
        Ok(())
    }

    async fn delete(&self) -> anyhow::Result<()> {
        info!(key = %self.key, lb_type = %self.lb_type, "Dry run: would delete load balancer");
        Ok(())
    }

    fn firewall_supported(&self) -> bool {
        self.firewall
    }
}
