//! Watch stream feeding the object cache and the change filter.

use super::filter::{ChangeFilter, FilterDecision};
use super::trigger::KeyTrigger;
use super::types::ObjectKey;
use crate::adapter::SchemaAdapter;
use futures::StreamExt;
use kube::runtime::reflector::store::Writer;
use kube::runtime::reflector::{ObjectRef, Store};
use kube::runtime::watcher::{self, Event};
use kube::runtime::WatchStreamExt;
use kube::Api;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Applies watch events to the cache, then runs them through the filter.
///
/// Objects from an initial or re-list only become visible in the cache on
/// `InitDone`, so they are held back until then; otherwise the controller
/// could look up an object before it is readable.
///
/// Siblings are told whenever a key appears in or disappears from this
/// cache, so a kind that defers to this one gets another look at that key.
pub struct EventSink<A: SchemaAdapter> {
    writer: Writer<A::Source>,
    reader: Store<A::Source>,
    filter: Arc<ChangeFilter<A>>,
    siblings: Vec<Arc<dyn KeyTrigger>>,
    listing: Vec<A::Source>,
}

impl<A: SchemaAdapter> EventSink<A> {
    pub fn new(writer: Writer<A::Source>, filter: Arc<ChangeFilter<A>>) -> Self {
        let reader = writer.as_reader();
        Self {
            writer,
            reader,
            filter,
            siblings: Vec::new(),
            listing: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_sibling(mut self, sibling: Arc<dyn KeyTrigger>) -> Self {
        self.siblings.push(sibling);
        self
    }

    pub fn reader(&self) -> Store<A::Source> {
        self.reader.clone()
    }

    pub async fn apply(&mut self, event: Event<A::Source>) -> Vec<FilterDecision> {
        match event {
            Event::Init => {
                self.listing.clear();
                self.writer.apply_watcher_event(&Event::Init);
                Vec::new()
            }
            Event::InitApply(obj) => {
                self.writer
                    .apply_watcher_event(&Event::InitApply(obj.clone()));
                self.listing.push(obj);
                Vec::new()
            }
            Event::InitDone => self.finish_listing().await,
            Event::Apply(obj) => {
                let old = self.reader.get(&ObjectRef::from_obj(&obj));
                self.writer.apply_watcher_event(&Event::Apply(obj.clone()));
                if old.is_none() {
                    self.notify_siblings(ObjectKey::for_resource(&obj).ok());
                }
                vec![self.dispatch(old.as_deref(), &obj).await]
            }
            Event::Delete(obj) => {
                self.writer.apply_watcher_event(&Event::Delete(obj.clone()));
                self.notify_siblings(ObjectKey::for_resource(&obj).ok());
                Vec::new()
            }
        }
    }

    async fn finish_listing(&mut self) -> Vec<FilterDecision> {
        // Previous snapshots must be read before the store swaps.
        let previous: HashSet<ObjectRef<A::Source>> = self
            .reader
            .state()
            .iter()
            .map(|obj| ObjectRef::from_obj(obj.as_ref()))
            .collect();
        let listed: Vec<_> = std::mem::take(&mut self.listing)
            .into_iter()
            .map(|obj| (self.reader.get(&ObjectRef::from_obj(&obj)), obj))
            .collect();
        self.writer.apply_watcher_event(&Event::InitDone);

        let listed_refs: HashSet<_> = listed
            .iter()
            .map(|(_, obj)| ObjectRef::from_obj(obj))
            .collect();
        for gone in previous.difference(&listed_refs) {
            self.notify_siblings(Some(ObjectKey::from(gone)));
        }

        debug!(kind = A::KIND, count = listed.len(), "Initial list applied");
        let mut decisions = Vec::with_capacity(listed.len());
        for (old, obj) in listed {
            if old.is_none() {
                self.notify_siblings(ObjectKey::for_resource(&obj).ok());
            }
            decisions.push(self.dispatch(old.as_deref(), &obj).await);
        }
        decisions
    }

    fn notify_siblings(&self, key: Option<ObjectKey>) {
        let Some(key) = key else { return };
        for sibling in &self.siblings {
            sibling.trigger(&key);
        }
    }

    async fn dispatch(&self, old: Option<&A::Source>, new: &A::Source) -> FilterDecision {
        match old {
            Some(old) => self.filter.on_update(old, new).await,
            None => self.filter.on_add(new).await,
        }
    }
}

/// Drive the watch for one kind until `shutdown` fires.
pub async fn run_watch<A: SchemaAdapter>(
    api: Api<A::Source>,
    mut sink: EventSink<A>,
    shutdown: CancellationToken,
) {
    info!(kind = A::KIND, "Starting watch");
    let stream = watcher::watcher(api, watcher::Config::default()).default_backoff();
    futures::pin_mut!(stream);

    loop {
        let next = tokio::select! {
            () = shutdown.cancelled() => break,
            next = stream.next() => next,
        };
        match next {
            Some(Ok(event)) => {
                sink.apply(event).await;
            }
            Some(Err(e)) => warn!(kind = A::KIND, error = %e, "Watch stream error"),
            None => break,
        }
    }
    info!(kind = A::KIND, "Watch stopped");
}
