//! Reconcile triggers feeding a controller's input stream.

use super::types::ObjectKey;
use futures::Stream;
use kube::runtime::reflector::Store;
use kube::runtime::watcher;
use kube::Resource;
use tokio::sync::mpsc;
use tracing::debug;

/// Sending half of a controller trigger stream
pub struct ReconcileTrigger<K> {
    tx: mpsc::UnboundedSender<K>,
}

impl<K> Clone for ReconcileTrigger<K> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<K> ReconcileTrigger<K> {
    /// Ask for `obj` to be reconciled. The controller collapses repeated
    /// triggers for an object into one pending run.
    pub fn send(&self, obj: K) {
        if self.tx.send(obj).is_err() {
            debug!("Controller has stopped, dropping trigger");
        }
    }
}

pub fn channel<K>() -> (ReconcileTrigger<K>, mpsc::UnboundedReceiver<K>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ReconcileTrigger { tx }, rx)
}

/// Adapt the receiving half into the shape `Controller::for_stream` takes.
pub fn into_stream<K: Send + 'static>(
    rx: mpsc::UnboundedReceiver<K>,
) -> impl Stream<Item = Result<K, watcher::Error>> + Send + 'static {
    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|obj| (Ok(obj), rx))
    })
}

/// Told when an object of another kind appears or disappears at a key
pub trait KeyTrigger: Send + Sync {
    fn trigger(&self, key: &ObjectKey);
}

/// Re-triggers whatever object of kind `K` is cached at a key
pub struct CachedObjectTrigger<K: Resource<DynamicType = ()> + Clone + 'static> {
    store: Store<K>,
    trigger: ReconcileTrigger<K>,
}

impl<K> CachedObjectTrigger<K>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    pub fn new(store: Store<K>, trigger: ReconcileTrigger<K>) -> Self {
        Self { store, trigger }
    }
}

impl<K> KeyTrigger for CachedObjectTrigger<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    fn trigger(&self, key: &ObjectKey) {
        if let Some(obj) = self.store.get(&key.object_ref()) {
            debug!(%key, "Re-triggering object after a change at the same key");
            self.trigger.send(obj.as_ref().clone());
        }
    }
}
