//! Annotation keys understood by the operator and their migration rules.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Prefix of every operator-owned annotation
pub const ANNOTATION_PREFIX: &str = "voyager.appscode.com/";

/// Prefix used by older releases; rewritten to [`ANNOTATION_PREFIX`] on read
pub const LEGACY_ANNOTATION_PREFIX: &str = "ingress.appscode.com/";

/// Well-known ingress class annotation shared with other ingress controllers
pub const INGRESS_CLASS_ANNOTATION: &str = "kubernetes.io/ingress.class";

/// Ingress class handled when the operator runs without an explicit class
pub const DEFAULT_INGRESS_CLASS: &str = "voyager";

pub const LB_TYPE: &str = "voyager.appscode.com/type";
pub const REPLICAS: &str = "voyager.appscode.com/replicas";
pub const LOAD_BALANCER_IP: &str = "voyager.appscode.com/load-balancer-ip";

/// Keep only operator-owned annotations, rewriting legacy keys.
///
/// When both the legacy and the current key are present the current key wins,
/// so migrating an already-migrated map is a no-op.
pub fn migrate(raw: Option<&BTreeMap<String, String>>) -> BTreeMap<String, String> {
    let Some(raw) = raw else {
        return BTreeMap::new();
    };

    let mut migrated: BTreeMap<String, String> = raw
        .iter()
        .filter(|(key, _)| key.starts_with(ANNOTATION_PREFIX))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    for (key, value) in raw {
        if let Some(suffix) = key.strip_prefix(LEGACY_ANNOTATION_PREFIX) {
            migrated
                .entry(format!("{ANNOTATION_PREFIX}{suffix}"))
                .or_insert_with(|| value.clone());
        }
    }

    migrated
}

/// How the generated load balancer is exposed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LbType {
    #[default]
    LoadBalancer,
    NodePort,
    HostPort,
    Internal,
}

impl FromStr for LbType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "LoadBalancer" => Ok(Self::LoadBalancer),
            "NodePort" => Ok(Self::NodePort),
            "HostPort" | "DaemonSet" => Ok(Self::HostPort),
            "Internal" => Ok(Self::Internal),
            other => Err(format!("unknown ingress type {other:?}")),
        }
    }
}

impl fmt::Display for LbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LoadBalancer => "LoadBalancer",
            Self::NodePort => "NodePort",
            Self::HostPort => "HostPort",
            Self::Internal => "Internal",
        };
        f.write_str(name)
    }
}
