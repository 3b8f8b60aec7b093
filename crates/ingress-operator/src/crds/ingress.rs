//! Voyager `Ingress` Custom Resource Definition

use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Backend service an HTTP path or TCP port routes to
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct IngressBackend {
    /// Name of the referenced service
    #[serde(rename = "serviceName")]
    pub service_name: String,

    /// Port of the referenced service (number or named port)
    #[serde(rename = "servicePort")]
    pub service_port: IntOrString,
}

/// TLS termination settings for a set of hosts
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct IngressTLS {
    /// Secret holding the certificate and key
    #[serde(default, rename = "secretName", skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,

    /// Hosts covered by the certificate
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
}

/// Single HTTP path routed to a backend
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct HTTPIngressPath {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    pub backend: IngressBackend,
}

/// HTTP rule value
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct HTTPIngressRuleValue {
    /// Frontend port; defaults to 80, or 443 when TLS applies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<IntOrString>,

    #[serde(default)]
    pub paths: Vec<HTTPIngressPath>,
}

/// TCP rule value
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct TCPIngressRuleValue {
    /// Frontend port opened on the load balancer
    pub port: IntOrString,

    pub backend: IngressBackend,
}

/// Host rule; exactly one of `http` or `tcp` must be set
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct IngressRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HTTPIngressRuleValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp: Option<TCPIngressRuleValue>,
}

/// Voyager `Ingress` CRD
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "voyager.appscode.com",
    version = "v1beta1",
    kind = "Ingress",
    root = "VoyagerIngress",
    shortname = "ing"
)]
#[kube(namespaced)]
#[kube(printcolumn = r#"{"name":"Hosts","type":"string","jsonPath":".spec.rules[*].host"}"#)]
#[kube(printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#)]
pub struct VoyagerIngressSpec {
    /// Default backend for requests matching no rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<IngressBackend>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tls: Vec<IngressTLS>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<IngressRule>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::Resource;

    #[test]
    fn crd_identity() {
        assert_eq!(VoyagerIngress::group(&()), "voyager.appscode.com");
        assert_eq!(VoyagerIngress::version(&()), "v1beta1");
        assert_eq!(VoyagerIngress::kind(&()), "Ingress");
    }

    #[test]
    fn spec_deserializes_http_and_tcp_rules() {
        let json = serde_json::json!({
            "rules": [
                {
                    "host": "shop.example.com",
                    "http": {
                        "paths": [
                            {"path": "/", "backend": {"serviceName": "web", "servicePort": 80}}
                        ]
                    }
                },
                {"tcp": {"port": 5432, "backend": {"serviceName": "db", "servicePort": "postgres"}}}
            ]
        });

        let spec: VoyagerIngressSpec = serde_json::from_value(json).unwrap();
        assert_eq!(spec.rules.len(), 2);
        assert_eq!(spec.rules[0].host.as_deref(), Some("shop.example.com"));
        let tcp = spec.rules[1].tcp.as_ref().unwrap();
        assert_eq!(tcp.port, IntOrString::Int(5432));
        assert_eq!(tcp.backend.service_port, IntOrString::String("postgres".to_string()));
        assert!(spec.backend.is_none());
    }
}
