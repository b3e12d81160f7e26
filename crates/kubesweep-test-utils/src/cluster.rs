//! Test cluster with operation tracing and failure injection.
//!
//! [`TracingCluster`] wraps a [`MemoryCluster`], records every call made
//! through [`ClusterAccessor`] and can be told to fail specific calls.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use kubesweep_core::{
    ClusterAccessor, DeletePropagation, Error, ListSelector, ManagedObject, MemoryCluster,
    ObjectRef, ResourceKind, Result,
};

/// Record of a cluster call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterOp {
    /// Discovery call.
    Discover,
    /// Get call.
    Get {
        /// Object that was read.
        object: ObjectRef,
    },
    /// Apply call.
    Apply {
        /// Object that was written.
        object: ObjectRef,
        /// `resourceVersion` sent with the write.
        resource_version: Option<String>,
    },
    /// List call.
    List {
        /// Kind that was listed.
        kind: ResourceKind,
        /// Selector that was sent.
        selector: ListSelector,
    },
    /// Delete call.
    Delete {
        /// Object that was deleted.
        object: ObjectRef,
        /// Propagation policy that was sent.
        propagation: DeletePropagation,
    },
}

impl ClusterOp {
    /// Returns true for apply and delete calls.
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Apply { .. } | Self::Delete { .. })
    }
}

/// Which call a counted failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// `discover`.
    Discover,
    /// `get`.
    Get,
    /// `apply`.
    Apply,
    /// `list`.
    List,
    /// `delete`.
    Delete,
}

#[derive(Debug, Default)]
struct Faults {
    /// Remaining transient failures per call kind.
    transient: HashMap<OpKind, u32>,
    /// Remaining conflicts per object.
    conflicts: HashMap<ObjectRef, u32>,
    discover_rejected: bool,
    /// Kind names whose listing always fails.
    list_failures: HashSet<String>,
    delete_failures: HashSet<ObjectRef>,
    /// Objects that disappear just before their delete call lands.
    vanish_on_delete: HashSet<ObjectRef>,
    cancel_on_apply: Option<(usize, CancellationToken)>,
}

/// In-memory cluster with operation tracing and failure injection.
///
/// Clones share state, so a test can keep one handle while the reconciler
/// owns another.
#[derive(Debug, Clone, Default)]
pub struct TracingCluster {
    inner: MemoryCluster,
    operations: Arc<Mutex<Vec<ClusterOp>>>,
    faults: Arc<Mutex<Faults>>,
    latency: Option<Duration>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

/// Decrements the in-flight gauge when a call returns.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl TracingCluster {
    /// Creates a new empty cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cluster that delays every call.
    #[must_use]
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Returns the wrapped memory cluster, for seeding and inspection
    /// without recording.
    #[must_use]
    pub fn inner(&self) -> &MemoryCluster {
        &self.inner
    }

    /// Seeds a live object without recording an operation.
    pub fn seed(&self, object: ManagedObject) -> ManagedObject {
        self.inner.insert(object).expect("seed object")
    }

    /// Returns the live copy of an object.
    #[must_use]
    pub fn live(&self, object: &ObjectRef) -> Option<ManagedObject> {
        self.inner.snapshot(object).expect("snapshot")
    }

    /// Returns the identities of all live objects, sorted.
    #[must_use]
    pub fn live_refs(&self) -> Vec<ObjectRef> {
        self.inner.object_refs().expect("object refs")
    }

    // ------------------------------------------------------------------------
    // Recording
    // ------------------------------------------------------------------------

    /// Returns all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<ClusterOp> {
        self.operations.lock().expect("lock").clone()
    }

    /// Clears recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().expect("lock").clear();
    }

    /// Returns the objects passed to `apply`, in call order.
    #[must_use]
    pub fn applied(&self) -> Vec<ObjectRef> {
        self.operations()
            .into_iter()
            .filter_map(|op| match op {
                ClusterOp::Apply { object, .. } => Some(object),
                _ => None,
            })
            .collect()
    }

    /// Returns the objects passed to `delete`, in call order.
    #[must_use]
    pub fn deleted(&self) -> Vec<ObjectRef> {
        self.operations()
            .into_iter()
            .filter_map(|op| match op {
                ClusterOp::Delete { object, .. } => Some(object),
                _ => None,
            })
            .collect()
    }

    /// Returns the `(kind, selector)` pairs passed to `list`, in call order.
    #[must_use]
    pub fn lists(&self) -> Vec<(ResourceKind, ListSelector)> {
        self.operations()
            .into_iter()
            .filter_map(|op| match op {
                ClusterOp::List { kind, selector } => Some((kind, selector)),
                _ => None,
            })
            .collect()
    }

    /// Returns the number of apply and delete calls.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.operations().iter().filter(|op| op.is_write()).count()
    }

    /// Returns the highest number of calls that were in progress at once.
    ///
    /// Only meaningful with [`TracingCluster::with_latency`]; without it
    /// calls complete without yielding.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Resets the in-flight peak, e.g. between phases of a test.
    pub fn reset_peak_in_flight(&self) {
        self.peak_in_flight.store(0, Ordering::SeqCst);
    }

    /// Returns the number of calls of `kind`.
    #[must_use]
    pub fn count(&self, kind: OpKind) -> usize {
        self.operations()
            .iter()
            .filter(|op| op_kind(op) == kind)
            .count()
    }

    // ------------------------------------------------------------------------
    // Failure injection
    // ------------------------------------------------------------------------

    /// Makes the next `times` calls of `kind` fail with a transient error.
    pub fn fail_transient(&self, kind: OpKind, times: u32) {
        *self
            .faults
            .lock()
            .expect("lock")
            .transient
            .entry(kind)
            .or_default() += times;
    }

    /// Makes the next `times` applies of `object` fail with a conflict.
    pub fn conflict_on_apply(&self, object: ObjectRef, times: u32) {
        *self
            .faults
            .lock()
            .expect("lock")
            .conflicts
            .entry(object)
            .or_default() += times;
    }

    /// Makes every discovery call fail.
    pub fn reject_discovery(&self) {
        self.faults.lock().expect("lock").discover_rejected = true;
    }

    /// Makes every list call for the named kind fail.
    pub fn fail_list(&self, kind: impl Into<String>) {
        self.faults
            .lock()
            .expect("lock")
            .list_failures
            .insert(kind.into());
    }

    /// Makes every delete of `object` fail.
    pub fn fail_delete(&self, object: ObjectRef) {
        self.faults
            .lock()
            .expect("lock")
            .delete_failures
            .insert(object);
    }

    /// Removes `object` just before its delete call, as if another actor
    /// deleted it between listing and sweeping.
    pub fn vanish_on_delete(&self, object: ObjectRef) {
        self.faults
            .lock()
            .expect("lock")
            .vanish_on_delete
            .insert(object);
    }

    /// Cancels `token` when the `nth` apply call (1-based) is made.
    pub fn cancel_on_apply(&self, nth: usize, token: CancellationToken) {
        self.faults.lock().expect("lock").cancel_on_apply = Some((nth, token));
    }

    /// Clears all injected failures.
    pub fn clear_failures(&self) {
        *self.faults.lock().expect("lock") = Faults::default();
    }

    fn record(&self, op: ClusterOp) {
        self.operations.lock().expect("lock").push(op);
    }

    fn take_transient(&self, kind: OpKind) -> Result<()> {
        let mut faults = self.faults.lock().expect("lock");
        if let Some(remaining) = faults.transient.get_mut(&kind) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Error::transient(format!("injected transient {kind:?} failure")));
            }
        }
        Ok(())
    }

    fn enter(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight(&self.in_flight)
    }

    async fn maybe_delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn op_kind(op: &ClusterOp) -> OpKind {
    match op {
        ClusterOp::Discover => OpKind::Discover,
        ClusterOp::Get { .. } => OpKind::Get,
        ClusterOp::Apply { .. } => OpKind::Apply,
        ClusterOp::List { .. } => OpKind::List,
        ClusterOp::Delete { .. } => OpKind::Delete,
    }
}

fn injected_rejection(what: &str) -> Error {
    Error::Rejected {
        message: format!("injected failure: {what}"),
    }
}

#[async_trait]
impl ClusterAccessor for TracingCluster {
    async fn discover(&self) -> Result<Vec<ResourceKind>> {
        let _in_flight = self.enter();
        self.maybe_delay().await;
        self.record(ClusterOp::Discover);
        self.take_transient(OpKind::Discover)?;
        if self.faults.lock().expect("lock").discover_rejected {
            return Err(injected_rejection("discovery"));
        }
        self.inner.discover().await
    }

    async fn get(&self, object: &ObjectRef) -> Result<Option<ManagedObject>> {
        let _in_flight = self.enter();
        self.maybe_delay().await;
        self.record(ClusterOp::Get {
            object: object.clone(),
        });
        self.take_transient(OpKind::Get)?;
        self.inner.get(object).await
    }

    async fn apply(&self, object: &ManagedObject) -> Result<ManagedObject> {
        let _in_flight = self.enter();
        self.maybe_delay().await;
        let key = object.object_ref();
        self.record(ClusterOp::Apply {
            object: key.clone(),
            resource_version: object.metadata.resource_version.clone(),
        });

        let cancel = {
            let faults = self.faults.lock().expect("lock");
            faults.cancel_on_apply.clone()
        };
        if let Some((nth, token)) = cancel {
            if self.count(OpKind::Apply) == nth {
                token.cancel();
            }
        }

        self.take_transient(OpKind::Apply)?;
        {
            let mut faults = self.faults.lock().expect("lock");
            if let Some(remaining) = faults.conflicts.get_mut(&key) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(Error::conflict(&key, "injected conflict"));
                }
            }
        }
        self.inner.apply(object).await
    }

    async fn list(
        &self,
        kind: &ResourceKind,
        selector: &ListSelector,
    ) -> Result<Vec<ManagedObject>> {
        let _in_flight = self.enter();
        self.maybe_delay().await;
        self.record(ClusterOp::List {
            kind: kind.clone(),
            selector: selector.clone(),
        });
        self.take_transient(OpKind::List)?;
        if self
            .faults
            .lock()
            .expect("lock")
            .list_failures
            .contains(&kind.kind)
        {
            return Err(injected_rejection(&format!("list {kind}")));
        }
        self.inner.list(kind, selector).await
    }

    async fn delete(&self, object: &ObjectRef, propagation: DeletePropagation) -> Result<()> {
        let _in_flight = self.enter();
        self.maybe_delay().await;
        self.record(ClusterOp::Delete {
            object: object.clone(),
            propagation,
        });
        self.take_transient(OpKind::Delete)?;

        let (rejected, vanish) = {
            let faults = self.faults.lock().expect("lock");
            (
                faults.delete_failures.contains(object),
                faults.vanish_on_delete.contains(object),
            )
        };
        if rejected {
            return Err(injected_rejection(&format!("delete {object}")));
        }
        if vanish {
            let _ = self.inner.delete(object, propagation).await;
        }
        self.inner.delete(object, propagation).await
    }
}
