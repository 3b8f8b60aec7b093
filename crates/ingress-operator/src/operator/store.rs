//! Read access to the watch-backed object caches.

use super::types::{ObjectKey, Result};
use kube::runtime::reflector::Store;
use kube::Resource;
use std::sync::Arc;

/// Eventually-consistent, read-only view of one resource kind
pub trait ResourceStore<K>: Send + Sync {
    /// Latest cached object for `key`; `None` when it is not (or no longer) known.
    fn get_by_key(&self, key: &ObjectKey) -> Result<Option<Arc<K>>>;
}

impl<K> ResourceStore<K> for Store<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    fn get_by_key(&self, key: &ObjectKey) -> Result<Option<Arc<K>>> {
        Ok(self.get(&key.object_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::networking::v1::Ingress;
    use kube::api::ObjectMeta;
    use kube::runtime::reflector::store;
    use kube::runtime::watcher;

    fn ingress(namespace: &str, name: &str) -> Ingress {
        Ingress {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..ObjectMeta::default()
            },
            ..Ingress::default()
        }
    }

    #[test]
    fn reflector_store_serves_applied_objects() {
        let (reader, mut writer) = store::<Ingress>();
        writer.apply_watcher_event(&watcher::Event::Apply(ingress("x", "a")));

        let found = reader.get_by_key(&ObjectKey::namespaced("x", "a")).unwrap();
        assert_eq!(found.unwrap().metadata.name.as_deref(), Some("a"));

        assert!(reader
            .get_by_key(&ObjectKey::namespaced("y", "a"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn deleted_objects_disappear() {
        let (reader, mut writer) = store::<Ingress>();
        writer.apply_watcher_event(&watcher::Event::Apply(ingress("x", "a")));
        writer.apply_watcher_event(&watcher::Event::Delete(ingress("x", "a")));

        assert!(reader
            .get_by_key(&ObjectKey::namespaced("x", "a"))
            .unwrap()
            .is_none());
    }
}
