#![allow(dead_code)]

use async_trait::async_trait;
use ingress_operator::canonical::{FinalizerOp, FinalizerSet};
use ingress_operator::operator::{
    DelegateFactory, FinalizerPatcher, IngressDelegate, ObjectKey, PatchOutcome, ResourceStore,
    Result,
};
use ingress_operator::CanonicalIngress;
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::ObjectMeta;
use kube::runtime::reflector::store::Writer;
use kube::runtime::reflector::{self, Store};
use kube::runtime::watcher::Event;
use kube::Resource;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn native_ingress(namespace: &str, name: &str) -> Ingress {
    Ingress {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            generation: Some(1),
            ..ObjectMeta::default()
        },
        spec: Some(IngressSpec {
            rules: Some(vec![IngressRule {
                host: Some("shop.example.com".to_string()),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some("/".to_string()),
                        path_type: "Prefix".to_string(),
                        backend: IngressBackend {
                            service: Some(IngressServiceBackend {
                                name: "web".to_string(),
                                port: Some(ServiceBackendPort {
                                    number: Some(80),
                                    name: None,
                                }),
                            }),
                            resource: None,
                        },
                    }],
                }),
            }]),
            ..IngressSpec::default()
        }),
        status: None,
    }
}

pub fn with_finalizer(mut ing: Ingress, finalizer: &str) -> Ingress {
    ing.metadata
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(finalizer.to_string());
    ing
}

pub fn terminating(mut ing: Ingress) -> Ingress {
    ing.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
    ing
}

/// Reflector cache filled by hand instead of by a watch. The fake patcher
/// writes through to it.
pub struct MemoryStore<K: Resource<DynamicType = ()> + Clone + 'static> {
    writer: Mutex<Writer<K>>,
    reader: Store<K>,
}

impl<K: Resource<DynamicType = ()> + Clone + 'static> MemoryStore<K> {
    pub fn new() -> Arc<Self> {
        let (reader, mut writer) = reflector::store();
        // An empty initial list marks the cache ready for a controller.
        writer.apply_watcher_event(&Event::Init);
        writer.apply_watcher_event(&Event::InitDone);
        Arc::new(Self {
            writer: Mutex::new(writer),
            reader,
        })
    }

    pub fn insert(&self, obj: K) {
        self.writer
            .lock()
            .unwrap()
            .apply_watcher_event(&Event::Apply(obj));
    }

    pub fn remove(&self, key: &ObjectKey) {
        if let Some(obj) = self.get(key) {
            self.writer
                .lock()
                .unwrap()
                .apply_watcher_event(&Event::Delete(obj.as_ref().clone()));
        }
    }

    pub fn get(&self, key: &ObjectKey) -> Option<Arc<K>> {
        self.reader.get(&key.object_ref())
    }

    pub fn reader(&self) -> Store<K> {
        self.reader.clone()
    }

    pub fn finalizers(&self, key: &ObjectKey) -> Vec<String> {
        self.get(key)
            .and_then(|obj| obj.meta().finalizers.clone())
            .unwrap_or_default()
    }
}

impl<K> ResourceStore<K> for MemoryStore<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    fn get_by_key(&self, key: &ObjectKey) -> Result<Option<Arc<K>>> {
        Ok(self.get(key))
    }
}

/// Applies finalizer patches to a [`MemoryStore`] and counts real writes
pub struct MemoryPatcher<K: Resource<DynamicType = ()> + Clone + 'static> {
    store: Arc<MemoryStore<K>>,
    pub writes: AtomicUsize,
}

impl<K: Resource<DynamicType = ()> + Clone + 'static> MemoryPatcher<K> {
    pub fn new(store: Arc<MemoryStore<K>>) -> Arc<Self> {
        Arc::new(Self {
            store,
            writes: AtomicUsize::new(0),
        })
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<K> FinalizerPatcher for MemoryPatcher<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    async fn patch_finalizers(&self, key: &ObjectKey, op: FinalizerOp) -> Result<PatchOutcome> {
        let Some(current) = self.store.get(key) else {
            return Ok(PatchOutcome {
                finalizers: FinalizerSet::default(),
                changed: false,
            });
        };

        let mut finalizers = FinalizerSet::from_metadata(current.meta().finalizers.as_ref());
        if !op.apply(&mut finalizers) {
            return Ok(PatchOutcome {
                finalizers,
                changed: false,
            });
        }

        let mut updated = (*current).clone();
        updated.meta_mut().finalizers = Some(finalizers.as_slice().to_vec());
        self.store.insert(updated);
        self.writes.fetch_add(1, Ordering::SeqCst);

        Ok(PatchOutcome {
            finalizers,
            changed: true,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Reconcile,
    Delete,
}

/// Shared state behind every delegate the factory hands out
#[derive(Default)]
pub struct DelegateLog {
    pub calls: Mutex<Vec<(String, Call)>>,
    pub firewall: AtomicBool,
    /// Scripted results for upcoming `reconcile` calls; `true` fails
    pub reconcile_failures: Mutex<VecDeque<bool>>,
    pub delete_fails: AtomicBool,
    pub delay: Mutex<Duration>,
    /// Delegate calls that ran to completion
    pub completed: AtomicUsize,
    in_flight: Mutex<HashMap<String, usize>>,
    pub max_in_flight: AtomicUsize,
}

impl DelegateLog {
    pub fn calls(&self) -> Vec<(String, Call)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls().iter().filter(|(_, c)| *c == call).count()
    }

    fn enter(&self, key: &str, call: Call) {
        self.calls.lock().unwrap().push((key.to_string(), call));
        let mut in_flight = self.in_flight.lock().unwrap();
        let count = in_flight.entry(key.to_string()).or_insert(0);
        *count += 1;
        self.max_in_flight.fetch_max(*count, Ordering::SeqCst);
    }

    fn leave(&self, key: &str) {
        if let Some(count) = self.in_flight.lock().unwrap().get_mut(key) {
            *count -= 1;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct RecordingFactory {
    pub log: Arc<DelegateLog>,
}

impl RecordingFactory {
    pub fn new(firewall: bool) -> Arc<Self> {
        let log = DelegateLog::default();
        log.firewall.store(firewall, Ordering::SeqCst);
        Arc::new(Self { log: Arc::new(log) })
    }
}

impl DelegateFactory for RecordingFactory {
    fn for_ingress(&self, ingress: &CanonicalIngress) -> Arc<dyn IngressDelegate> {
        Arc::new(RecordingDelegate {
            key: ingress.key().to_string(),
            log: Arc::clone(&self.log),
        })
    }
}

struct RecordingDelegate {
    key: String,
    log: Arc<DelegateLog>,
}

impl RecordingDelegate {
    async fn pause(&self) {
        let delay = *self.log.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl IngressDelegate for RecordingDelegate {
    async fn reconcile(&self) -> anyhow::Result<()> {
        self.log.enter(&self.key, Call::Reconcile);
        self.pause().await;
        self.log.leave(&self.key);

        let fail = self
            .log
            .reconcile_failures
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(false);
        if fail {
            anyhow::bail!("load balancer api unavailable");
        }
        Ok(())
    }

    async fn delete(&self) -> anyhow::Result<()> {
        self.log.enter(&self.key, Call::Delete);
        self.pause().await;
        self.log.leave(&self.key);

        if self.log.delete_fails.load(Ordering::SeqCst) {
            anyhow::bail!("load balancer api unavailable");
        }
        Ok(())
    }

    fn firewall_supported(&self) -> bool {
        self.log.firewall.load(Ordering::SeqCst)
    }
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
