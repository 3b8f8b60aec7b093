//! Operator configuration
//!
//! Loaded once at startup from a mounted YAML file and immutable for the
//! lifetime of the process.

use crate::canonical::validation::LOAD_BALANCER_PROVIDERS;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main operator configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OperatorConfig {
    /// Attempts a failing key gets before it is dropped
    #[serde(default = "default_max_num_requeues", rename = "maxNumRequeues")]
    pub max_num_requeues: u32,

    /// Worker tasks per pipeline
    #[serde(default = "default_num_threads", rename = "numThreads")]
    pub num_threads: usize,

    /// Ingress class this operator is responsible for (empty = unclassed + "voyager")
    #[serde(default = "default_ingress_class", rename = "ingressClass")]
    pub ingress_class: String,

    /// Cloud provider the cluster runs on (aws, gce, minikube, ...)
    #[serde(default = "default_cloud_provider", rename = "cloudProvider")]
    pub cloud_provider: String,

    /// Restrict watches to one namespace; all namespaces when unset
    #[serde(default, rename = "watchNamespace")]
    pub watch_namespace: Option<String>,

    /// Also watch `networking.k8s.io/v1` Ingress objects
    #[serde(default = "default_true", rename = "watchNativeIngress")]
    pub watch_native_ingress: bool,

    /// Reporting controller name on emitted events
    #[serde(default = "default_controller_name", rename = "controllerName")]
    pub controller_name: String,

    /// Retry backoff for failing keys
    #[serde(default)]
    pub backoff: BackoffConfig,

    /// Listen address for the health server
    #[serde(default = "default_health_bind_address", rename = "healthBindAddress")]
    pub health_bind_address: String,
}

/// Per-key exponential backoff
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BackoffConfig {
    #[serde(default = "default_base_delay_millis", rename = "baseDelayMillis")]
    pub base_delay_millis: u64,

    #[serde(default = "default_max_delay_seconds", rename = "maxDelaySeconds")]
    pub max_delay_seconds: u64,
}

impl BackoffConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_millis)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_seconds)
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_millis: default_base_delay_millis(),
            max_delay_seconds: default_max_delay_seconds(),
        }
    }
}

fn default_max_num_requeues() -> u32 {
    5
}

fn default_num_threads() -> usize {
    2
}

fn default_ingress_class() -> String {
    std::env::var("INGRESS_CLASS").unwrap_or_default()
}

fn default_cloud_provider() -> String {
    std::env::var("CLOUD_PROVIDER").unwrap_or_default()
}

fn default_true() -> bool {
    true
}

fn default_controller_name() -> String {
    "voyager-operator".to_string()
}

fn default_base_delay_millis() -> u64 {
    5
}

fn default_max_delay_seconds() -> u64 {
    1000
}

fn default_health_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

impl OperatorConfig {
    /// Load configuration from mounted `ConfigMap` file
    pub fn from_mounted_file(config_path: &str) -> Result<Self, anyhow::Error> {
        let config_str = std::fs::read_to_string(config_path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {config_path}: {e}"))?;

        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, anyhow::Error> {
        serde_yaml::from_str(yaml).map_err(|e| anyhow::anyhow!("Failed to parse config YAML: {e}"))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.num_threads == 0 {
            return Err(anyhow::anyhow!("numThreads must be at least 1"));
        }

        if self.backoff.base_delay_millis == 0 {
            return Err(anyhow::anyhow!("backoff.baseDelayMillis must be positive"));
        }

        if self.backoff.base_delay() > self.backoff.max_delay() {
            return Err(anyhow::anyhow!(
                "backoff.baseDelayMillis ({}ms) exceeds backoff.maxDelaySeconds ({}s)",
                self.backoff.base_delay_millis,
                self.backoff.max_delay_seconds
            ));
        }

        if self.controller_name.trim().is_empty() {
            return Err(anyhow::anyhow!("controllerName must not be empty"));
        }

        if !self.cloud_provider.is_empty()
            && !LOAD_BALANCER_PROVIDERS.contains(&self.cloud_provider.as_str())
        {
            return Err(anyhow::anyhow!(
                "Unknown cloudProvider '{}'. Expected one of: {}",
                self.cloud_provider,
                LOAD_BALANCER_PROVIDERS.join(", ")
            ));
        }

        Ok(())
    }
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            max_num_requeues: default_max_num_requeues(),
            num_threads: default_num_threads(),
            ingress_class: default_ingress_class(),
            cloud_provider: default_cloud_provider(),
            watch_namespace: None,
            watch_native_ingress: true,
            controller_name: default_controller_name(),
            backoff: BackoffConfig::default(),
            health_bind_address: default_health_bind_address(),
        }
    }
}
