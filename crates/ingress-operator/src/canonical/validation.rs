//! Cloud-provider-aware validation of canonical ingresses.

use super::annotations::{LbType, LOAD_BALANCER_IP, REPLICAS};
use super::{Backend, CanonicalIngress};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use thiserror::Error;

/// Providers able to provision a `LoadBalancer` service
pub const LOAD_BALANCER_PROVIDERS: &[&str] = &[
    "aws",
    "gce",
    "gke",
    "azure",
    "acs",
    "aks",
    "openstack",
    "digitalocean",
    "linode",
    "minikube",
];

/// Providers honoring a requested load balancer IP
pub const LOAD_BALANCER_IP_PROVIDERS: &[&str] = &["gce", "gke", "azure", "acs", "aks", "openstack"];

const DEFAULT_HTTP_PORT: i32 = 80;
const DEFAULT_HTTPS_PORT: i32 = 443;

/// All rule violations found in a single ingress
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .violations.join("; "))]
pub struct ValidationError {
    pub violations: Vec<String>,
}

/// Validate `ingress` for `cloud_provider`, collecting every violation.
pub fn validate(ingress: &CanonicalIngress, cloud_provider: &str) -> Result<(), ValidationError> {
    let mut violations = Vec::new();

    check_annotations(ingress, cloud_provider, &mut violations);
    check_rules(ingress, &mut violations);

    for (index, tls) in ingress.spec.tls.iter().enumerate() {
        if tls.secret_name.as_deref().unwrap_or_default().is_empty() {
            violations.push(format!("tls[{index}] is missing secretName"));
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { violations })
    }
}

fn check_annotations(ingress: &CanonicalIngress, cloud_provider: &str, out: &mut Vec<String>) {
    let lb_type = match ingress.lb_type() {
        Ok(lb_type) => Some(lb_type),
        Err(e) => {
            out.push(e);
            None
        }
    };

    if lb_type == Some(LbType::LoadBalancer) && !LOAD_BALANCER_PROVIDERS.contains(&cloud_provider) {
        out.push(format!(
            "LoadBalancer type ingress is unsupported for cloud provider {cloud_provider:?}"
        ));
    }

    if let Some(ip) = ingress.annotation(LOAD_BALANCER_IP) {
        if ip.parse::<IpAddr>().is_err() {
            out.push(format!("invalid load balancer ip {ip:?}"));
        }
        if lb_type.is_some_and(|t| t != LbType::LoadBalancer) {
            out.push("load balancer ip is only supported for LoadBalancer type ingress".to_string());
        } else if !LOAD_BALANCER_IP_PROVIDERS.contains(&cloud_provider) {
            out.push(format!(
                "load balancer ip is unsupported for cloud provider {cloud_provider:?}"
            ));
        }
    }

    if let Some(replicas) = ingress.annotation(REPLICAS) {
        if replicas.parse::<u32>().is_err() {
            out.push(format!("replicas must be a non-negative integer, got {replicas:?}"));
        }
    }
}

fn check_rules(ingress: &CanonicalIngress, out: &mut Vec<String>) {
    let spec = &ingress.spec;
    if spec.rules.is_empty() && spec.backend.is_none() {
        out.push("ingress has neither rules nor a default backend".to_string());
    }

    if let Some(backend) = &spec.backend {
        check_backend("backend", backend, out);
    }

    let tls_hosts: BTreeSet<&str> = spec
        .tls
        .iter()
        .flat_map(|tls| tls.hosts.iter().map(String::as_str))
        .collect();

    let mut http_routes: BTreeSet<(i32, String, String)> = BTreeSet::new();
    let mut http_ports: BTreeSet<i32> = BTreeSet::new();
    let mut tcp_ports: BTreeMap<i32, usize> = BTreeMap::new();

    for (index, rule) in spec.rules.iter().enumerate() {
        let prefix = format!("rules[{index}]");
        let host = rule.host.as_deref().unwrap_or_default();
        if !host.is_empty() {
            check_host(&prefix, host, out);
        }

        match (&rule.http, &rule.tcp) {
            (Some(_), Some(_)) | (None, None) => {
                out.push(format!("{prefix} must specify exactly one of http or tcp"));
            }
            (Some(http), None) => {
                let default_port = if tls_hosts.contains(host) {
                    DEFAULT_HTTPS_PORT
                } else {
                    DEFAULT_HTTP_PORT
                };
                let port = match &http.port {
                    None => Some(default_port),
                    Some(port) => frontend_port(&format!("{prefix}.http.port"), port, out),
                };
                if let Some(port) = port {
                    http_ports.insert(port);
                }
                for (path_index, path) in http.paths.iter().enumerate() {
                    let path_prefix = format!("{prefix}.http.paths[{path_index}]");
                    let value = path.path.clone().unwrap_or_else(|| "/".to_string());
                    if !value.starts_with('/') {
                        out.push(format!("{path_prefix} path {value:?} must start with '/'"));
                    }
                    if let Some(port) = port {
                        if !http_routes.insert((port, host.to_string(), value.clone())) {
                            out.push(format!(
                                "{path_prefix} duplicates host {host:?} path {value:?} on port {port}"
                            ));
                        }
                    }
                    check_backend(&format!("{path_prefix}.backend"), &path.backend, out);
                }
            }
            (None, Some(tcp)) => {
                check_backend(&format!("{prefix}.tcp.backend"), &tcp.backend, out);
                match &tcp.port {
                    IntOrString::Int(_) => {
                        if let Some(port) = frontend_port(&format!("{prefix}.tcp.port"), &tcp.port, out) {
                            if let Some(previous) = tcp_ports.insert(port, index) {
                                out.push(format!(
                                    "tcp port {port} is used by both rules[{previous}] and {prefix}"
                                ));
                            }
                        }
                    }
                    IntOrString::String(value) => {
                        out.push(format!("{prefix}.tcp.port must be numeric, got {value:?}"));
                    }
                }
            }
        }
    }

    for port in tcp_ports.keys().filter(|port| http_ports.contains(port)) {
        out.push(format!("port {port} is used by both http and tcp rules"));
    }
}

fn check_host(prefix: &str, host: &str, out: &mut Vec<String>) {
    let name = host.strip_prefix("*.").unwrap_or(host);
    if name.contains('*') {
        out.push(format!("{prefix} host {host:?} may only use a leading '*.' wildcard"));
        return;
    }
    if name.split('.').any(str::is_empty) {
        out.push(format!("{prefix} host {host:?} has an empty label"));
    }
}

fn check_backend(prefix: &str, backend: &Backend, out: &mut Vec<String>) {
    if backend.service_name.trim().is_empty() {
        out.push(format!("{prefix} is missing serviceName"));
    }
    match &backend.service_port {
        IntOrString::Int(port) if !(1..=65535).contains(port) => {
            out.push(format!("{prefix} servicePort {port} is out of range"));
        }
        IntOrString::String(name) if name.trim().is_empty() => {
            out.push(format!("{prefix} is missing servicePort"));
        }
        _ => {}
    }
}

fn frontend_port(field: &str, port: &IntOrString, out: &mut Vec<String>) -> Option<i32> {
    let parsed = match port {
        IntOrString::Int(value) => Some(*value),
        IntOrString::String(value) => value.parse::<i32>().ok(),
    };
    match parsed {
        Some(value) if (1..=65535).contains(&value) => Some(value),
        _ => {
            out.push(format!("{field} must be a port number between 1 and 65535"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::annotations::LB_TYPE;
    use crate::canonical::fixtures::ingress;
    use crate::canonical::{HttpPath, HttpRule, Rule, TcpRule, TlsEntry};

    fn tcp_rule(port: IntOrString) -> Rule {
        Rule {
            host: None,
            http: None,
            tcp: Some(TcpRule {
                port,
                backend: Backend {
                    service_name: "db".to_string(),
                    service_port: IntOrString::Int(5432),
                },
            }),
        }
    }

    #[test]
    fn valid_http_ingress_on_aws() {
        assert!(validate(&ingress("x", "a"), "aws").is_ok());
    }

    #[test]
    fn load_balancer_requires_supported_provider() {
        let err = validate(&ingress("x", "a"), "baremetal").unwrap_err();
        assert!(err.to_string().contains("unsupported for cloud provider"));

        let mut ing = ingress("x", "a");
        ing.annotations
            .insert(LB_TYPE.to_string(), "HostPort".to_string());
        assert!(validate(&ing, "baremetal").is_ok());
    }

    #[test]
    fn load_balancer_ip_rules() {
        let mut ing = ingress("x", "a");
        ing.annotations
            .insert(LOAD_BALANCER_IP.to_string(), "10.0.0.7".to_string());
        assert!(validate(&ing, "gce").is_ok());
        assert!(validate(&ing, "aws").is_err());

        ing.annotations
            .insert(LOAD_BALANCER_IP.to_string(), "not-an-ip".to_string());
        let err = validate(&ing, "gce").unwrap_err();
        assert_eq!(err.violations, vec![r#"invalid load balancer ip "not-an-ip""#.to_string()]);
    }

    #[test]
    fn collects_every_violation() {
        let mut ing = ingress("x", "a");
        ing.annotations
            .insert(REPLICAS.to_string(), "-1".to_string());
        ing.spec.rules[0].http.as_mut().unwrap().paths[0].path = Some("api".to_string());
        ing.spec.rules[0].http.as_mut().unwrap().paths[0].backend.service_name = String::new();
        ing.spec.tls.push(TlsEntry::default());

        let err = validate(&ing, "aws").unwrap_err();
        assert_eq!(err.violations.len(), 4, "{err}");
    }

    #[test]
    fn rule_needs_exactly_one_protocol() {
        let mut ing = ingress("x", "a");
        ing.spec.rules.push(Rule::default());
        let err = validate(&ing, "aws").unwrap_err();
        assert!(err.to_string().contains("rules[1] must specify exactly one of http or tcp"));
    }

    #[test]
    fn empty_ingress_is_rejected() {
        let mut ing = ingress("x", "a");
        ing.spec.rules.clear();
        assert!(validate(&ing, "aws").is_err());
    }

    #[test]
    fn tcp_ports_must_be_unique_and_not_shared_with_http() {
        let mut ing = ingress("x", "a");
        ing.spec.rules.push(tcp_rule(IntOrString::Int(5432)));
        ing.spec.rules.push(tcp_rule(IntOrString::Int(5432)));
        ing.spec.rules.push(tcp_rule(IntOrString::Int(80)));

        let err = validate(&ing, "aws").unwrap_err();
        assert!(err.to_string().contains("tcp port 5432 is used by both rules[1] and rules[2]"));
        assert!(err.to_string().contains("port 80 is used by both http and tcp rules"));
    }

    #[test]
    fn named_tcp_port_is_rejected() {
        let mut ing = ingress("x", "a");
        ing.spec.rules.push(tcp_rule(IntOrString::Int(5432)));
        assert!(validate(&ing, "aws").is_ok());

        ing.spec.rules[1] = tcp_rule(IntOrString::String("pg".to_string()));
        let err = validate(&ing, "aws").unwrap_err();
        assert!(err.to_string().contains("rules[1].tcp.port must be numeric"));
    }

    #[test]
    fn duplicate_paths_on_same_host_and_port() {
        let mut ing = ingress("x", "a");
        let http = HttpRule {
            port: None,
            paths: vec![HttpPath {
                path: Some("/".to_string()),
                backend: Backend {
                    service_name: "other".to_string(),
                    service_port: IntOrString::Int(8080),
                },
            }],
        };
        ing.spec.rules.push(Rule {
            host: Some("shop.example.com".to_string()),
            http: Some(http),
            tcp: None,
        });
        let err = validate(&ing, "aws").unwrap_err();
        assert!(err.to_string().contains("duplicates host"));
    }

    #[test]
    fn wildcard_hosts() {
        let mut ing = ingress("x", "a");
        ing.spec.rules[0].host = Some("*.example.com".to_string());
        assert!(validate(&ing, "aws").is_ok());

        ing.spec.rules[0].host = Some("shop.*.com".to_string());
        assert!(validate(&ing, "aws").is_err());
    }
}
