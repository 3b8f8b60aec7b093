use super::{ConversionError, SchemaAdapter};
use crate::canonical::annotations::{self, INGRESS_CLASS_ANNOTATION};
use crate::canonical::{
    Backend, CanonicalIngress, CanonicalSpec, FinalizerSet, HttpPath, HttpRule, Rule, TcpRule,
    TlsEntry,
};
use crate::crds::{IngressBackend, VoyagerIngress};

/// Adapter for the Voyager `Ingress` custom resource
#[derive(Debug, Clone, Copy, Default)]
pub struct CrdAdapter;

impl SchemaAdapter for CrdAdapter {
    type Source = VoyagerIngress;

    const KIND: &'static str = "IngressCRD";

    fn to_canonical(&self, source: &VoyagerIngress) -> Result<CanonicalIngress, ConversionError> {
        let meta = &source.metadata;
        let name = meta
            .name
            .clone()
            .ok_or(ConversionError::MissingName { kind: Self::KIND })?;

        let spec = &source.spec;
        let rules = spec
            .rules
            .iter()
            .map(|rule| Rule {
                host: rule.host.clone(),
                http: rule.http.as_ref().map(|http| HttpRule {
                    port: http.port.clone(),
                    paths: http
                        .paths
                        .iter()
                        .map(|path| HttpPath {
                            path: path.path.clone(),
                            backend: backend(&path.backend),
                        })
                        .collect(),
                }),
                tcp: rule.tcp.as_ref().map(|tcp| TcpRule {
                    port: tcp.port.clone(),
                    backend: backend(&tcp.backend),
                }),
            })
            .collect();

        let tls = spec
            .tls
            .iter()
            .map(|tls| TlsEntry {
                secret_name: tls.secret_name.clone(),
                hosts: tls.hosts.clone(),
            })
            .collect();

        Ok(CanonicalIngress {
            namespace: meta.namespace.clone(),
            name,
            annotations: annotations::migrate(meta.annotations.as_ref()),
            ingress_class: meta
                .annotations
                .as_ref()
                .and_then(|a| a.get(INGRESS_CLASS_ANNOTATION))
                .cloned(),
            spec: CanonicalSpec {
                backend: spec.backend.as_ref().map(backend),
                tls,
                rules,
            },
            deletion_timestamp: meta.deletion_timestamp.as_ref().map(|t| t.0),
            finalizers: FinalizerSet::from_metadata(meta.finalizers.as_ref()),
            generation: meta.generation,
        })
    }
}

fn backend(source: &IngressBackend) -> Backend {
    Backend {
        service_name: source.service_name.clone(),
        service_port: source.service_port.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::annotations::LB_TYPE;
    use crate::crds::{HTTPIngressPath, HTTPIngressRuleValue, IngressRule, VoyagerIngressSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    fn voyager_ingress() -> VoyagerIngress {
        let mut ing = VoyagerIngress::new(
            "a",
            VoyagerIngressSpec {
                backend: None,
                tls: Vec::new(),
                rules: vec![IngressRule {
                    host: Some("shop.example.com".to_string()),
                    http: Some(HTTPIngressRuleValue {
                        port: None,
                        paths: vec![HTTPIngressPath {
                            path: Some("/".to_string()),
                            backend: IngressBackend {
                                service_name: "web".to_string(),
                                service_port: IntOrString::Int(80),
                            },
                        }],
                    }),
                    tcp: None,
                }],
            },
        );
        ing.metadata.namespace = Some("x".to_string());
        ing
    }

    #[test]
    fn converts_metadata_and_spec() {
        let mut ing = voyager_ingress();
        ing.metadata.annotations = Some(BTreeMap::from([
            (INGRESS_CLASS_ANNOTATION.to_string(), "voyager".to_string()),
            ("ingress.appscode.com/type".to_string(), "NodePort".to_string()),
        ]));
        ing.metadata.finalizers = Some(vec!["voyager.appscode.com".to_string()]);
        ing.metadata.generation = Some(4);

        let canonical = CrdAdapter.to_canonical(&ing).unwrap();
        assert_eq!(canonical.key().to_string(), "x/a");
        assert_eq!(canonical.ingress_class.as_deref(), Some("voyager"));
        assert_eq!(canonical.annotation(LB_TYPE), Some("NodePort"));
        assert!(canonical.has_finalizer("voyager.appscode.com"));
        assert!(!canonical.is_terminating());
        assert_eq!(canonical.generation, Some(4));
        assert_eq!(canonical.spec.rules[0].http.as_ref().unwrap().paths[0].backend.service_name, "web");
    }

    #[test]
    fn deletion_timestamp_marks_terminating() {
        let mut ing = voyager_ingress();
        ing.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
        assert!(CrdAdapter.to_canonical(&ing).unwrap().is_terminating());
    }

    #[test]
    fn unnamed_object_fails_conversion() {
        let mut ing = voyager_ingress();
        ing.metadata = ObjectMeta::default();
        assert_eq!(
            CrdAdapter.to_canonical(&ing),
            Err(ConversionError::MissingName { kind: "IngressCRD" })
        );
    }
}
