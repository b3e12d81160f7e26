//! Reconciler metrics.
//!
//! Counters and histograms for apply/sweep runs. These complement the
//! structured logging emitted by the reconciler.

use metrics::{counter, describe_counter, describe_histogram, histogram};

// ============================================================================
// Run Metrics
// ============================================================================

/// Objects applied counter.
pub const OBJECTS_APPLIED: &str = "kubesweep_objects_applied_total";

/// Orphans deleted counter.
pub const OBJECTS_DELETED: &str = "kubesweep_objects_deleted_total";

/// Orphan candidates kept, by reason.
pub const ORPHANS_SKIPPED: &str = "kubesweep_orphans_skipped_total";

/// Errors recorded in run results, by phase.
pub const ERRORS: &str = "kubesweep_errors_total";

/// Run duration histogram.
pub const RUN_DURATION: &str = "kubesweep_run_duration_seconds";

// ============================================================================
// Retry Metrics
// ============================================================================

/// Retry counter, by operation.
pub const RETRY: &str = "kubesweep_retry_total";

/// Registers all metric descriptions.
///
/// Call this once at application startup after installing a recorder.
pub fn register_metrics() {
    describe_counter!(OBJECTS_APPLIED, "Total objects applied by reconcile runs");
    describe_counter!(OBJECTS_DELETED, "Total orphaned objects deleted");
    describe_counter!(ORPHANS_SKIPPED, "Total orphan candidates kept, by reason");
    describe_counter!(ERRORS, "Total errors recorded in run results");
    describe_histogram!(RUN_DURATION, "Duration of reconcile runs in seconds");
    describe_counter!(RETRY, "Total retried cluster calls");
}

/// Records the outcome of a completed run.
pub fn record_run_completion(
    outcome: &str,
    applied: u64,
    deleted: u64,
    duration_secs: f64,
) {
    let labels = [("outcome", outcome.to_string())];

    counter!(OBJECTS_APPLIED, &labels).increment(applied);
    counter!(OBJECTS_DELETED, &labels).increment(deleted);
    histogram!(RUN_DURATION, &labels).record(duration_secs);
}

/// Records a kept orphan candidate.
pub fn record_skipped(reason: &str) {
    counter!(ORPHANS_SKIPPED, "reason" => reason.to_string()).increment(1);
}

/// Records an error entry.
pub fn record_error(phase: &str) {
    counter!(ERRORS, "phase" => phase.to_string()).increment(1);
}

/// Records a retry attempt.
pub fn record_retry(operation: &str) {
    counter!(RETRY, "operation" => operation.to_string()).increment(1);
}
