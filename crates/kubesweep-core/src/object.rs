//! Managed object model.
//!
//! A [`ManagedObject`] is an opaque, dynamically-typed resource record: the
//! type fields, Kubernetes [`ObjectMeta`], and a free-form body that kubesweep
//! never interprets. Identity is captured separately by [`ObjectRef`] and the
//! unit of listing by [`ResourceKind`].

use std::fmt;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Splits an `apiVersion` into `(group, version)`.
///
/// The core group has no prefix, so `v1` yields `("", "v1")`.
#[must_use]
pub fn split_api_version(api_version: &str) -> (&str, &str) {
    api_version.rsplit_once('/').unwrap_or(("", api_version))
}

/// A listable resource type served by the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceKind {
    /// API group (empty for the core group).
    pub group: String,
    /// API version within the group.
    pub version: String,
    /// Kind name, e.g. `ConfigMap`.
    pub kind: String,
    /// Whether objects of this kind live in a namespace.
    pub namespaced: bool,
}

impl ResourceKind {
    /// Creates a resource kind from an `apiVersion` string and a kind name.
    #[must_use]
    pub fn new(api_version: &str, kind: impl Into<String>, namespaced: bool) -> Self {
        let (group, version) = split_api_version(api_version);
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.into(),
            namespaced,
        }
    }

    /// Returns the `apiVersion` string for this kind.
    #[must_use]
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Returns true if `object` is of this group and kind (any version).
    #[must_use]
    pub fn matches(&self, object: &ObjectRef) -> bool {
        self.group == object.group && self.kind == object.kind
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Kind={}", self.api_version(), self.kind)
    }
}

/// Identity of a live object.
///
/// The API version is not part of the identity: the same object served under
/// `apps/v1` and `apps/v1beta2` is one object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    /// API group (empty for the core group).
    pub group: String,
    /// Kind name.
    pub kind: String,
    /// Namespace, `None` for cluster-scoped objects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Object name.
    pub name: String,
}

impl ObjectRef {
    /// Creates an identity from its parts.
    #[must_use]
    pub fn new(
        api_version: &str,
        kind: impl Into<String>,
        namespace: Option<&str>,
        name: impl Into<String>,
    ) -> Self {
        let (group, _) = split_api_version(api_version);
        Self {
            group: group.to_string(),
            kind: kind.into(),
            namespace: namespace.map(str::to_string),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.kind)?;
        } else {
            write!(f, "{}.{}", self.kind, self.group)?;
        }
        match &self.namespace {
            Some(ns) => write!(f, " {ns}/{}", self.name),
            None => write!(f, " {}", self.name),
        }
    }
}

/// An opaque cluster resource record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedObject {
    /// `apiVersion` of the object, e.g. `apps/v1`.
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    /// Kind name.
    pub kind: String,
    /// Standard object metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Everything else (spec, data, status, ...), never interpreted.
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl ManagedObject {
    /// Creates an object with empty body and the given identity.
    #[must_use]
    pub fn new(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        namespace: Option<&str>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            metadata: ObjectMeta {
                name: Some(name.into()),
                namespace: namespace.map(str::to_string),
                ..ObjectMeta::default()
            },
            body: Map::new(),
        }
    }

    /// Sets a top-level body field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.body.insert(key.into(), value);
        self
    }

    /// Returns the object name (empty if unset).
    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// Returns the namespace, if any.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.metadata.namespace.as_deref()
    }

    /// Returns the identity of this object.
    #[must_use]
    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(&self.api_version, &self.kind, self.namespace(), self.name())
    }

    /// Returns the resource kind this object belongs to.
    ///
    /// Scope is inferred from the presence of a namespace.
    #[must_use]
    pub fn resource_kind(&self) -> ResourceKind {
        ResourceKind::new(&self.api_version, &self.kind, self.namespace().is_some())
    }

    /// Returns true if the cluster is already deleting this object.
    #[must_use]
    pub fn is_terminating(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }
}
