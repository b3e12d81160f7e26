//! Pre-built test fixtures for common test scenarios.
//!
//! Provides factory functions to create test objects with sensible defaults.

use std::sync::Arc;

use serde_json::json;

use kubesweep_core::{ManagedObject, Metadata, OwnerReference, Time};
use kubesweep_gc::keys::{ANNOTATION_GC_STRATEGY, GC_STRATEGY_IGNORE};
use kubesweep_gc::tag::{write_scope, write_tag};
use kubesweep_gc::{DeploymentScope, GcTag, MigrationPhase, Reconciler, ReconcilerConfig};

use crate::cluster::TracingCluster;

/// Namespace used by fixtures unless stated otherwise.
pub const TEST_NAMESPACE: &str = "default";

/// Scope used by [`TestContext`].
pub const TEST_SCOPE: &str = "test-scope";

/// Creates a `ConfigMap` in [`TEST_NAMESPACE`].
pub fn config_map(name: &str) -> ManagedObject {
    ManagedObject::new("v1", "ConfigMap", Some(TEST_NAMESPACE), name)
        .with_field("data", json!({ "key": name }))
}

/// Creates a `Deployment` in [`TEST_NAMESPACE`].
pub fn deployment(name: &str) -> ManagedObject {
    ManagedObject::new("apps/v1", "Deployment", Some(TEST_NAMESPACE), name)
}

/// Creates a cluster-scoped `ClusterRole`.
pub fn cluster_role(name: &str) -> ManagedObject {
    ManagedObject::new("rbac.authorization.k8s.io/v1", "ClusterRole", None, name)
}

/// Stamps `object` the way a run with `tag` and `scope` would.
pub fn tagged(
    mut object: ManagedObject,
    tag: &str,
    scope: &str,
    phase: MigrationPhase,
) -> ManagedObject {
    write_tag(&mut object, tag, phase);
    write_scope(&mut object, scope, phase);
    object
}

/// Marks `object` with the `ignore` GC strategy.
pub fn ignored(mut object: ManagedObject) -> ManagedObject {
    object.set_annotation(ANNOTATION_GC_STRATEGY, GC_STRATEGY_IGNORE);
    object
}

/// Adds a controller owner reference to `object`.
pub fn controlled_by(mut object: ManagedObject, kind: &str, name: &str) -> ManagedObject {
    object
        .metadata
        .owner_references
        .get_or_insert_with(Vec::new)
        .push(OwnerReference {
            api_version: "apps/v1".to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
            uid: format!("{name}-uid"),
            controller: Some(true),
            ..OwnerReference::default()
        });
    object
}

/// Marks `object` as being deleted by the cluster.
pub fn terminating(mut object: ManagedObject) -> ManagedObject {
    object.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
    object
}

/// Test context with a shared tracing cluster and a fixed scope.
pub struct TestContext {
    /// Shared cluster.
    pub cluster: TracingCluster,
    /// Deployment scope of every run.
    pub scope: DeploymentScope,
    /// Migration phase for runs and seeded objects.
    pub phase: MigrationPhase,
}

impl TestContext {
    /// Creates a phase-1 context.
    pub fn new() -> Self {
        Self::with_phase(MigrationPhase::AnnotationOnly)
    }

    /// Creates a context for `phase`.
    pub fn with_phase(phase: MigrationPhase) -> Self {
        crate::init_test_logging();
        Self {
            cluster: TracingCluster::new(),
            scope: DeploymentScope::new(TEST_SCOPE).expect("scope"),
            phase,
        }
    }

    /// Returns a reconciler over the shared cluster with no retries.
    pub fn reconciler(&self) -> Reconciler {
        self.reconciler_with(ReconcilerConfig {
            migration_phase: self.phase,
            ..ReconcilerConfig::development()
        })
    }

    /// Returns a reconciler over the shared cluster with `config`.
    pub fn reconciler_with(&self, config: ReconcilerConfig) -> Reconciler {
        Reconciler::new(Arc::new(self.cluster.clone()), config).expect("reconciler")
    }

    /// Seeds `object` as a previous run with `tag` left it.
    pub fn seed_tagged(&self, object: ManagedObject, tag: &str) -> ManagedObject {
        self.cluster
            .seed(tagged(object, tag, self.scope.as_str(), self.phase))
    }

    /// Creates a run tag.
    pub fn tag(value: &str) -> GcTag {
        GcTag::new(value).expect("tag")
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
