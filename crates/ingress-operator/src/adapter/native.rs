use super::{ConversionError, SchemaAdapter};
use crate::canonical::annotations::{self, INGRESS_CLASS_ANNOTATION};
use crate::canonical::{
    Backend, CanonicalIngress, CanonicalSpec, FinalizerSet, HttpPath, HttpRule, Rule, TlsEntry,
};
use k8s_openapi::api::networking::v1::{Ingress, IngressBackend};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

/// Adapter for the native `networking.k8s.io/v1` `Ingress`
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeAdapter;

impl SchemaAdapter for NativeAdapter {
    type Source = Ingress;

    const KIND: &'static str = "Ingress";

    fn to_canonical(&self, source: &Ingress) -> Result<CanonicalIngress, ConversionError> {
        let meta = &source.metadata;
        let name = meta
            .name
            .clone()
            .ok_or(ConversionError::MissingName { kind: Self::KIND })?;
        let key = match &meta.namespace {
            Some(namespace) => format!("{namespace}/{name}"),
            None => name.clone(),
        };

        let spec = source.spec.clone().unwrap_or_default();

        let default_backend = spec
            .default_backend
            .as_ref()
            .map(|b| backend(b, &key, "spec.defaultBackend"))
            .transpose()?;

        let mut rules = Vec::new();
        for (index, rule) in spec.rules.iter().flatten().enumerate() {
            let http = match &rule.http {
                Some(http) => {
                    let mut paths = Vec::with_capacity(http.paths.len());
                    for (path_index, path) in http.paths.iter().enumerate() {
                        let field = format!("spec.rules[{index}].http.paths[{path_index}].backend");
                        paths.push(HttpPath {
                            path: path.path.clone(),
                            backend: backend(&path.backend, &key, &field)?,
                        });
                    }
                    Some(HttpRule { port: None, paths })
                }
                None => None,
            };
            rules.push(Rule {
                host: rule.host.clone(),
                http,
                tcp: None,
            });
        }

        let tls = spec
            .tls
            .iter()
            .flatten()
            .map(|tls| TlsEntry {
                secret_name: tls.secret_name.clone(),
                hosts: tls.hosts.clone().unwrap_or_default(),
            })
            .collect();

        let ingress_class = spec.ingress_class_name.clone().or_else(|| {
            meta.annotations
                .as_ref()
                .and_then(|a| a.get(INGRESS_CLASS_ANNOTATION))
                .cloned()
        });

        Ok(CanonicalIngress {
            namespace: meta.namespace.clone(),
            name,
            annotations: annotations::migrate(meta.annotations.as_ref()),
            ingress_class,
            spec: CanonicalSpec {
                backend: default_backend,
                tls,
                rules,
            },
            deletion_timestamp: meta.deletion_timestamp.as_ref().map(|t| t.0),
            finalizers: FinalizerSet::from_metadata(meta.finalizers.as_ref()),
            generation: meta.generation,
        })
    }
}

fn backend(source: &IngressBackend, key: &str, field: &str) -> Result<Backend, ConversionError> {
    let Some(service) = &source.service else {
        return Err(ConversionError::ResourceBackend {
            kind: NativeAdapter::KIND,
            key: key.to_string(),
            field: field.to_string(),
        });
    };

    let port = service.port.as_ref().and_then(|port| {
        port.number
            .map(IntOrString::Int)
            .or_else(|| port.name.clone().map(IntOrString::String))
    });

    let Some(service_port) = port else {
        return Err(ConversionError::MissingServicePort {
            kind: NativeAdapter::KIND,
            key: key.to_string(),
            field: field.to_string(),
        });
    };

    Ok(Backend {
        service_name: service.name.clone(),
        service_port,
    })
}
