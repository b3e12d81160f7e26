//! Cluster access contract.
//!
//! This is the only seam through which kubesweep performs I/O. A concrete
//! implementation talks to the Kubernetes API; [`MemoryCluster`](crate::memory::MemoryCluster)
//! implements it in memory for tests and dry runs.
//!
//! ## Error contract
//!
//! - `delete` of a missing object returns [`Error::NotFound`](crate::Error::NotFound)
//! - `apply` with a stale `resourceVersion` returns [`Error::Conflict`](crate::Error::Conflict)
//! - network and 5xx failures return [`Error::Transient`](crate::Error::Transient)

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::object::{ManagedObject, ObjectRef, ResourceKind};

/// Server-side filter for list calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListSelector {
    /// Every object of the kind.
    All,
    /// Objects carrying `key=value` as a label.
    LabelEquals {
        /// Label key.
        key: String,
        /// Required label value.
        value: String,
    },
}

impl ListSelector {
    /// Creates an equality label selector.
    #[must_use]
    pub fn label(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::LabelEquals {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Returns true if an object with these labels is selected.
    #[must_use]
    pub fn matches(&self, labels: Option<&BTreeMap<String, String>>) -> bool {
        match self {
            Self::All => true,
            Self::LabelEquals { key, value } => labels
                .and_then(|l| l.get(key))
                .is_some_and(|v| v == value),
        }
    }

    /// Returns the `labelSelector` query value, or `None` for an unfiltered list.
    #[must_use]
    pub fn to_query(&self) -> Option<String> {
        match self {
            Self::All => None,
            Self::LabelEquals { key, value } => Some(format!("{key}={value}")),
        }
    }
}

impl fmt::Display for ListSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_query() {
            Some(query) => f.write_str(&query),
            None => f.write_str("<all>"),
        }
    }
}

/// How dependents of a deleted object are handled by the cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeletePropagation {
    /// Dependents are deleted before the owner disappears.
    #[default]
    Foreground,
    /// The owner disappears immediately; dependents are collected later.
    Background,
    /// Dependents are left in place with their owner reference removed.
    Orphan,
}

impl DeletePropagation {
    /// Returns the API string for this policy.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Foreground => "Foreground",
            Self::Background => "Background",
            Self::Orphan => "Orphan",
        }
    }
}

impl fmt::Display for DeletePropagation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access to the live cluster.
///
/// All calls are independent and may be issued concurrently.
#[async_trait]
pub trait ClusterAccessor: Send + Sync + 'static {
    /// Lists the resource kinds that support list and delete.
    async fn discover(&self) -> Result<Vec<ResourceKind>>;

    /// Reads the live state of an object.
    ///
    /// Returns `None` if the object doesn't exist.
    async fn get(&self, object: &ObjectRef) -> Result<Option<ManagedObject>>;

    /// Creates or updates an object and returns the stored result.
    ///
    /// If `metadata.resourceVersion` is set and stale, returns a conflict.
    async fn apply(&self, object: &ManagedObject) -> Result<ManagedObject>;

    /// Lists objects of one kind across all namespaces.
    ///
    /// **Ordering**: arbitrary; callers needing determinism must sort.
    async fn list(&self, kind: &ResourceKind, selector: &ListSelector)
    -> Result<Vec<ManagedObject>>;

    /// Deletes an object.
    ///
    /// Returns `Error::NotFound` if it is already gone.
    async fn delete(&self, object: &ObjectRef, propagation: DeletePropagation) -> Result<()>;
}
