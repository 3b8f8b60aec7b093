//! Canonical ingress model
//!
//! Both watched resource kinds are converted into [`CanonicalIngress`] before
//! any filtering or reconciliation happens, so diffing, validation and class
//! matching behave identically regardless of where an object came from.

pub mod annotations;
pub mod diff;
pub mod finalizer;
pub mod validation;

use crate::operator::types::ObjectKey;
use annotations::{LbType, DEFAULT_INGRESS_CLASS, LB_TYPE};
use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde::Serialize;
use std::collections::BTreeMap;

pub use diff::{DiffResult, FieldChange};
pub use finalizer::{FinalizerOp, FinalizerSet};
pub use validation::ValidationError;

/// Service backend
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Backend {
    pub service_name: String,
    pub service_port: IntOrString,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpPath {
    pub path: Option<String>,
    pub backend: Backend,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HttpRule {
    pub port: Option<IntOrString>,
    pub paths: Vec<HttpPath>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TcpRule {
    pub port: IntOrString,
    pub backend: Backend,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Rule {
    pub host: Option<String>,
    pub http: Option<HttpRule>,
    pub tcp: Option<TcpRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsEntry {
    pub secret_name: Option<String>,
    pub hosts: Vec<String>,
}

/// Routing spec shared by both source kinds
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CanonicalSpec {
    pub backend: Option<Backend>,
    pub tls: Vec<TlsEntry>,
    pub rules: Vec<Rule>,
}

/// Normalized, source-independent view of an ingress
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalIngress {
    pub namespace: Option<String>,
    pub name: String,
    /// Operator-owned annotations only, already migrated
    pub annotations: BTreeMap<String, String>,
    pub ingress_class: Option<String>,
    pub spec: CanonicalSpec,
    pub deletion_timestamp: Option<DateTime<Utc>>,
    pub finalizers: FinalizerSet,
    /// Only used for change detection, never for ordering
    pub generation: Option<i64>,
}

impl CanonicalIngress {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }

    pub fn is_terminating(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers.contains(finalizer)
    }

    /// Whether an operator configured with `ingress_class` owns this ingress.
    ///
    /// An empty configured class claims unclassified ingresses and those
    /// explicitly marked `voyager`; otherwise the classes must match exactly.
    pub fn should_handle(&self, ingress_class: &str) -> bool {
        let own = self.ingress_class.as_deref().unwrap_or_default();
        if ingress_class.is_empty() {
            own.is_empty() || own == DEFAULT_INGRESS_CLASS
        } else {
            own == ingress_class
        }
    }

    pub fn lb_type(&self) -> Result<LbType, String> {
        self.annotations
            .get(LB_TYPE)
            .map_or(Ok(LbType::default()), |value| value.parse())
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn ingress(namespace: &str, name: &str) -> CanonicalIngress {
        CanonicalIngress {
            namespace: Some(namespace.to_string()),
            name: name.to_string(),
            annotations: BTreeMap::new(),
            ingress_class: None,
            spec: CanonicalSpec {
                backend: None,
                tls: Vec::new(),
                rules: vec![Rule {
                    host: Some("shop.example.com".to_string()),
                    http: Some(HttpRule {
                        port: None,
                        paths: vec![HttpPath {
                            path: Some("/".to_string()),
                            backend: Backend {
                                service_name: "web".to_string(),
                                service_port: IntOrString::Int(80),
                            },
                        }],
                    }),
                    tcp: None,
                }],
            },
            deletion_timestamp: None,
            finalizers: FinalizerSet::default(),
            generation: Some(1),
        }
    }
}
