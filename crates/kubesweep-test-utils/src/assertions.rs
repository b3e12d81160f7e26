//! Custom assertion helpers for integration tests.

use kubesweep_core::ObjectRef;
use kubesweep_gc::{RunPhase, RunResult, SkipReason};

use crate::cluster::TracingCluster;

/// Asserts that a run finished `Done` without errors.
///
/// # Panics
///
/// Panics if the run did not succeed or recorded errors.
pub fn assert_run_succeeded(result: &RunResult) {
    assert_eq!(
        result.phase,
        RunPhase::Done,
        "Expected run to succeed, but phase was {:?} with errors {:?}",
        result.phase,
        result.errors
    );
    assert!(
        result.errors.is_empty(),
        "Expected no errors, but got {:?}",
        result.errors
    );
}

/// Asserts that a run finished `Failed`.
///
/// # Panics
///
/// Panics if the run did not fail.
pub fn assert_run_failed(result: &RunResult) {
    assert_eq!(
        result.phase,
        RunPhase::Failed,
        "Expected run to fail, but phase was {:?}",
        result.phase
    );
    assert!(result.has_errors(), "Expected at least one recorded error");
}

/// Asserts that `object` is live in `cluster`.
///
/// # Panics
///
/// Panics if the object is gone.
pub fn assert_live(cluster: &TracingCluster, object: &ObjectRef) {
    assert!(
        cluster.live(object).is_some(),
        "Expected {object} to be live, live objects: {:?}",
        cluster.live_refs()
    );
}

/// Asserts that `object` is not live in `cluster`.
///
/// # Panics
///
/// Panics if the object still exists.
pub fn assert_gone(cluster: &TracingCluster, object: &ObjectRef) {
    assert!(
        cluster.live(object).is_none(),
        "Expected {object} to be deleted"
    );
}

/// Asserts that `object` was kept for `reason`.
///
/// # Panics
///
/// Panics if the object was not reported as skipped with that reason.
pub fn assert_skipped(result: &RunResult, object: &ObjectRef, reason: SkipReason) {
    assert_eq!(
        result.skip_reason(object),
        Some(reason),
        "Expected {object} to be skipped as {reason}, skipped: {:?}",
        result.skipped_orphans
    );
}

/// Asserts that no apply or delete call reached the cluster.
///
/// # Panics
///
/// Panics if any write was recorded.
pub fn assert_no_writes(cluster: &TracingCluster) {
    let writes: Vec<_> = cluster
        .operations()
        .into_iter()
        .filter(|op| op.is_write())
        .collect();
    assert!(writes.is_empty(), "Expected no writes, got {writes:?}");
}
