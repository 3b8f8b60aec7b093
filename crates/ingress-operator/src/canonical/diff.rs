//! Change detection between two canonical snapshots of the same ingress.

use super::CanonicalIngress;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// One differing field, addressed by a dotted/indexed path
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub path: String,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let render = |v: &Option<Value>| v.as_ref().map_or_else(|| "<none>".to_string(), Value::to_string);
        write!(f, "{}: {} -> {}", self.path, render(&self.old), render(&self.new))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffResult {
    pub changed: bool,
    pub changes: Vec<FieldChange>,
}

impl fmt::Display for DiffResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.changes.is_empty() {
            return f.write_str("no changes");
        }
        let rendered: Vec<String> = self.changes.iter().map(ToString::to_string).collect();
        f.write_str(&rendered.join("; "))
    }
}

/// Fields that participate in change detection. Finalizers are left out so
/// the operator's own finalizer patches never re-trigger the pipeline.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DiffView<'a> {
    annotations: &'a BTreeMap<String, String>,
    ingress_class: &'a Option<String>,
    spec: &'a super::CanonicalSpec,
    deletion_timestamp: &'a Option<DateTime<Utc>>,
    generation: &'a Option<i64>,
}

impl<'a> From<&'a CanonicalIngress> for DiffView<'a> {
    fn from(ing: &'a CanonicalIngress) -> Self {
        Self {
            annotations: &ing.annotations,
            ingress_class: &ing.ingress_class,
            spec: &ing.spec,
            deletion_timestamp: &ing.deletion_timestamp,
            generation: &ing.generation,
        }
    }
}

/// Compare `old` against `new`.
pub fn diff(old: &CanonicalIngress, new: &CanonicalIngress) -> DiffResult {
    let old_value = serde_json::to_value(DiffView::from(old)).unwrap_or(Value::Null);
    let new_value = serde_json::to_value(DiffView::from(new)).unwrap_or(Value::Null);

    let mut changes = Vec::new();
    walk(String::new(), Some(&old_value), Some(&new_value), &mut changes);

    DiffResult {
        changed: !changes.is_empty(),
        changes,
    }
}

fn walk(path: String, old: Option<&Value>, new: Option<&Value>, out: &mut Vec<FieldChange>) {
    match (old, new) {
        (Some(Value::Object(a)), Some(Value::Object(b))) => {
            let mut keys: Vec<&String> = a.keys().chain(b.keys()).collect();
            keys.sort();
            keys.dedup();
            for key in keys {
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                walk(child, a.get(key), b.get(key), out);
            }
        }
        (Some(Value::Array(a)), Some(Value::Array(b))) => {
            for index in 0..a.len().max(b.len()) {
                walk(format!("{path}[{index}]"), a.get(index), b.get(index), out);
            }
        }
        (a, b) if a == b => {}
        (a, b) => out.push(FieldChange {
            path,
            old: a.filter(|v| !v.is_null()).cloned(),
            new: b.filter(|v| !v.is_null()).cloned(),
        }),
    }
}
