//! Typed access to the three metadata fields kubesweep reads and writes.
//!
//! Absent maps and lists behave exactly like empty ones. Setters create the
//! underlying map on first write.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};

use crate::object::ManagedObject;

/// Accessor over annotations, labels and owner references.
pub trait Metadata {
    /// Returns the annotation value for `key`.
    fn annotation(&self, key: &str) -> Option<&str>;

    /// Returns the label value for `key`.
    fn label(&self, key: &str) -> Option<&str>;

    /// Returns the owner references (empty if unset).
    fn owner_references(&self) -> &[OwnerReference];

    /// Sets an annotation, creating the map if needed.
    fn set_annotation(&mut self, key: &str, value: &str);

    /// Sets a label, creating the map if needed.
    fn set_label(&mut self, key: &str, value: &str);

    /// Removes an annotation, returning the previous value.
    fn remove_annotation(&mut self, key: &str) -> Option<String>;

    /// Removes a label, returning the previous value.
    fn remove_label(&mut self, key: &str) -> Option<String>;
}

fn lookup<'a>(map: Option<&'a BTreeMap<String, String>>, key: &str) -> Option<&'a str> {
    map.and_then(|m| m.get(key)).map(String::as_str)
}

impl Metadata for ObjectMeta {
    fn annotation(&self, key: &str) -> Option<&str> {
        lookup(self.annotations.as_ref(), key)
    }

    fn label(&self, key: &str) -> Option<&str> {
        lookup(self.labels.as_ref(), key)
    }

    fn owner_references(&self) -> &[OwnerReference] {
        self.owner_references.as_deref().unwrap_or_default()
    }

    fn set_annotation(&mut self, key: &str, value: &str) {
        self.annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
    }

    fn set_label(&mut self, key: &str, value: &str) {
        self.labels
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
    }

    fn remove_annotation(&mut self, key: &str) -> Option<String> {
        self.annotations.as_mut().and_then(|m| m.remove(key))
    }

    fn remove_label(&mut self, key: &str) -> Option<String> {
        self.labels.as_mut().and_then(|m| m.remove(key))
    }
}

impl Metadata for ManagedObject {
    fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata.annotation(key)
    }

    fn label(&self, key: &str) -> Option<&str> {
        self.metadata.label(key)
    }

    fn owner_references(&self) -> &[OwnerReference] {
        self.metadata.owner_references()
    }

    fn set_annotation(&mut self, key: &str, value: &str) {
        self.metadata.set_annotation(key, value);
    }

    fn set_label(&mut self, key: &str, value: &str) {
        self.metadata.set_label(key, value);
    }

    fn remove_annotation(&mut self, key: &str) -> Option<String> {
        self.metadata.remove_annotation(key)
    }

    fn remove_label(&mut self, key: &str) -> Option<String> {
        self.metadata.remove_label(key)
    }
}
