//! In-memory cluster for testing.
//!
//! Thread-safe via `RwLock`. Not suitable for production.
//! Resource versions are a single cluster-wide counter (stored as strings in
//! metadata) to mimic etcd revision semantics.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::accessor::{ClusterAccessor, DeletePropagation, ListSelector};
use crate::error::{Error, Result};
use crate::object::{ManagedObject, ObjectRef, ResourceKind};

/// In-memory [`ClusterAccessor`].
#[derive(Debug, Default, Clone)]
pub struct MemoryCluster {
    objects: Arc<RwLock<BTreeMap<ObjectRef, ManagedObject>>>,
    kinds: Arc<RwLock<BTreeSet<ResourceKind>>>,
    revision: Arc<AtomicU64>,
}

fn poisoned() -> Error {
    Error::Internal {
        message: "lock poisoned".into(),
    }
}

impl MemoryCluster {
    /// Creates a new empty cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes a kind visible to discovery even if no object of it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn register_kind(&self, kind: ResourceKind) -> Result<()> {
        self.kinds.write().map_err(|_| poisoned())?.insert(kind);
        Ok(())
    }

    /// Stores an object as-is, bypassing conflict checks.
    ///
    /// Use this to seed pre-existing live state.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn insert(&self, object: ManagedObject) -> Result<ManagedObject> {
        self.store(object, false)
    }

    /// Returns a copy of the live object, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn snapshot(&self, object: &ObjectRef) -> Result<Option<ManagedObject>> {
        Ok(self
            .objects
            .read()
            .map_err(|_| poisoned())?
            .get(object)
            .cloned())
    }

    /// Returns the identities of all live objects, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn object_refs(&self) -> Result<Vec<ObjectRef>> {
        Ok(self
            .objects
            .read()
            .map_err(|_| poisoned())?
            .keys()
            .cloned()
            .collect())
    }

    fn next_revision(&self) -> String {
        (self.revision.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn store(&self, mut object: ManagedObject, check_version: bool) -> Result<ManagedObject> {
        let key = object.object_ref();
        if key.name.is_empty() {
            return Err(Error::InvalidInput(format!(
                "{} object has no name",
                object.kind
            )));
        }

        let mut objects = self.objects.write().map_err(|_| poisoned())?;
        let current = objects.get(&key);

        if check_version {
            if let Some(expected) = object.metadata.resource_version.as_deref() {
                let actual = current.and_then(|o| o.metadata.resource_version.as_deref());
                if actual != Some(expected) {
                    return Err(Error::conflict(
                        &key,
                        format!(
                            "resourceVersion {expected} does not match live {}",
                            actual.unwrap_or("<none>")
                        ),
                    ));
                }
            }
        }

        let uid = current
            .and_then(|o| o.metadata.uid.clone())
            .or_else(|| object.metadata.uid.clone())
            .unwrap_or_else(|| format!("uid-{}", self.revision.load(Ordering::SeqCst) + 1));
        object.metadata.uid = Some(uid);
        object.metadata.resource_version = Some(self.next_revision());

        objects.insert(key, object.clone());
        drop(objects);

        self.kinds
            .write()
            .map_err(|_| poisoned())?
            .insert(object.resource_kind());

        Ok(object)
    }
}

#[async_trait]
impl ClusterAccessor for MemoryCluster {
    async fn discover(&self) -> Result<Vec<ResourceKind>> {
        Ok(self
            .kinds
            .read()
            .map_err(|_| poisoned())?
            .iter()
            .cloned()
            .collect())
    }

    async fn get(&self, object: &ObjectRef) -> Result<Option<ManagedObject>> {
        self.snapshot(object)
    }

    async fn apply(&self, object: &ManagedObject) -> Result<ManagedObject> {
        self.store(object.clone(), true)
    }

    async fn list(
        &self,
        kind: &ResourceKind,
        selector: &ListSelector,
    ) -> Result<Vec<ManagedObject>> {
        let objects = self.objects.read().map_err(|_| poisoned())?;

        Ok(objects
            .iter()
            .filter(|(key, _)| kind.matches(key))
            .filter(|(_, o)| selector.matches(o.metadata.labels.as_ref()))
            .map(|(_, o)| o.clone())
            .collect())
    }

    async fn delete(&self, object: &ObjectRef, _propagation: DeletePropagation) -> Result<()> {
        self.objects
            .write()
            .map_err(|_| poisoned())?
            .remove(object)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(object.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Metadata;

    fn config_map(name: &str) -> ManagedObject {
        ManagedObject::new("v1", "ConfigMap", Some("default"), name)
    }

    #[tokio::test]
    async fn apply_assigns_version_and_uid() {
        let cluster = MemoryCluster::new();
        let stored = cluster.apply(&config_map("a")).await.expect("apply");

        assert_eq!(stored.metadata.resource_version.as_deref(), Some("1"));
        assert!(stored.metadata.uid.is_some());

        let again = cluster.apply(&config_map("a")).await.expect("reapply");
        assert_eq!(again.metadata.resource_version.as_deref(), Some("2"));
        assert_eq!(again.metadata.uid, stored.metadata.uid);
    }

    #[tokio::test]
    async fn stale_resource_version_conflicts() {
        let cluster = MemoryCluster::new();
        let stored = cluster.apply(&config_map("a")).await.expect("apply");
        cluster.apply(&config_map("a")).await.expect("bump");

        let err = cluster.apply(&stored).await.expect_err("stale write");
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn discovery_tracks_applied_kinds() {
        let cluster = MemoryCluster::new();
        cluster
            .register_kind(ResourceKind::new("apps/v1", "Deployment", true))
            .expect("register");
        cluster.apply(&config_map("a")).await.expect("apply");

        let kinds = cluster.discover().await.expect("discover");
        assert_eq!(kinds.len(), 2);
        assert!(kinds.iter().any(|k| k.kind == "ConfigMap"));
    }

    #[tokio::test]
    async fn list_filters_by_kind_and_label() {
        let cluster = MemoryCluster::new();
        let mut labelled = config_map("labelled");
        labelled.set_label("tier", "web");
        cluster.insert(labelled).expect("insert");
        cluster.insert(config_map("plain")).expect("insert");
        cluster
            .insert(ManagedObject::new("v1", "Secret", Some("default"), "s"))
            .expect("insert");

        let kind = ResourceKind::new("v1", "ConfigMap", true);
        let all = cluster.list(&kind, &ListSelector::All).await.expect("list");
        assert_eq!(all.len(), 2);

        let web = cluster
            .list(&kind, &ListSelector::label("tier", "web"))
            .await
            .expect("list");
        assert_eq!(web.len(), 1);
        assert_eq!(web[0].name(), "labelled");
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let cluster = MemoryCluster::new();
        let stored = cluster.apply(&config_map("a")).await.expect("apply");
        let key = stored.object_ref();

        cluster
            .delete(&key, DeletePropagation::Foreground)
            .await
            .expect("delete");
        let err = cluster
            .delete(&key, DeletePropagation::Foreground)
            .await
            .expect_err("second delete");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn unnamed_objects_are_rejected() {
        let cluster = MemoryCluster::new();
        let mut object = config_map("x");
        object.metadata.name = None;
        let err = cluster.apply(&object).await.expect_err("no name");
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
