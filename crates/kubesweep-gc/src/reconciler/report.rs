//! Run report types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kubesweep_core::{ObjectRef, ResourceKind};

use crate::eligibility::SkipReason;
use crate::reconciler::state::RunPhase;

// ============================================================================
// Errors
// ============================================================================

/// Classification of a failure recorded during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunErrorKind {
    /// The cluster was unreachable or rejected the call, after bounded retry.
    Access,
    /// Apply kept hitting optimistic-concurrency conflicts.
    Conflict,
    /// Listing one resource kind failed; that kind was not swept.
    PartialList,
    /// The run was cancelled before all operations were issued.
    Cancelled,
}

impl RunErrorKind {
    /// Returns the stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Conflict => "conflict",
            Self::PartialList => "partial_list",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RunErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure isolated to one object, one kind, or the run itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    /// Phase in which the failure happened.
    pub phase: RunPhase,
    /// Failure class.
    pub kind: RunErrorKind,
    /// Object the failure is about, if any.
    pub object: Option<ObjectRef>,
    /// Resource kind the failure is about, for listing failures.
    pub resource: Option<ResourceKind>,
    /// Human-readable description.
    pub message: String,
}

impl RunError {
    /// Creates an error about a single object.
    #[must_use]
    pub fn for_object(
        phase: RunPhase,
        kind: RunErrorKind,
        object: ObjectRef,
        message: impl Into<String>,
    ) -> Self {
        Self {
            phase,
            kind,
            object: Some(object),
            resource: None,
            message: message.into(),
        }
    }

    /// Creates an error about a resource kind.
    #[must_use]
    pub fn for_kind(
        phase: RunPhase,
        kind: RunErrorKind,
        resource: ResourceKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            phase,
            kind,
            object: None,
            resource: Some(resource),
            message: message.into(),
        }
    }

    /// Creates a run-level error.
    #[must_use]
    pub fn for_run(phase: RunPhase, kind: RunErrorKind, message: impl Into<String>) -> Self {
        Self {
            phase,
            kind,
            object: None,
            resource: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}]", self.phase, self.kind)?;
        if let Some(object) = &self.object {
            write!(f, " {object}")?;
        } else if let Some(resource) = &self.resource {
            write!(f, " {resource}")?;
        }
        write!(f, ": {}", self.message)
    }
}

// ============================================================================
// Run Result
// ============================================================================

/// An in-scope object outside the desired set that was kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedObject {
    /// Identity of the kept object.
    pub object: ObjectRef,
    /// Why it was kept.
    pub reason: SkipReason,
}

/// Outcome of one reconcile run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Unique identifier of this run (ULID).
    pub run_id: String,

    /// Tag the desired objects were stamped with.
    pub run_tag: String,

    /// Deployment scope of the run.
    pub scope: String,

    /// Terminal phase: `Done` or `Failed`.
    pub phase: RunPhase,

    /// Whether writes were suppressed.
    pub dry_run: bool,

    /// Objects applied (or, in a dry run, that would be applied).
    pub applied_count: usize,

    /// Orphans actually deleted; always zero in a dry run.
    pub deleted_count: usize,

    /// Identities of applied objects, sorted.
    pub applied: Vec<ObjectRef>,

    /// Orphans selected for deletion, sorted.
    pub orphans: Vec<ObjectRef>,

    /// In-scope objects outside the desired set that were kept, sorted.
    pub skipped_orphans: Vec<SkippedObject>,

    /// Kinds whose listing failed and were not swept.
    pub degraded_kinds: Vec<ResourceKind>,

    /// Every failure recorded during the run.
    pub errors: Vec<RunError>,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run reached a terminal phase.
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunResult {
    /// Creates an empty result for a run that is about to start.
    #[must_use]
    pub fn new(run_id: String, run_tag: &str, scope: &str, dry_run: bool) -> Self {
        Self {
            run_id,
            run_tag: run_tag.to_string(),
            scope: scope.to_string(),
            phase: RunPhase::Stamping,
            dry_run,
            applied_count: 0,
            deleted_count: 0,
            applied: Vec::new(),
            orphans: Vec::new(),
            skipped_orphans: Vec::new(),
            degraded_kinds: Vec::new(),
            errors: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Returns true if the run finished in `Done`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.phase == RunPhase::Done
    }

    /// Returns true if discovery or any listing failed, so sweep coverage is
    /// incomplete. Cancellation alone does not degrade a run.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.errors.iter().any(|e| {
            e.phase == RunPhase::Listing
                && matches!(e.kind, RunErrorKind::PartialList | RunErrorKind::Access)
        })
    }

    /// Returns true if any errors were recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns true if the run was cancelled.
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.errors_of_kind(RunErrorKind::Cancelled).next().is_some()
    }

    /// Returns errors of a specific kind.
    pub fn errors_of_kind(&self, kind: RunErrorKind) -> impl Iterator<Item = &RunError> {
        self.errors.iter().filter(move |e| e.kind == kind)
    }

    /// Returns the reason `object` was kept, if it was.
    #[must_use]
    pub fn skip_reason(&self, object: &ObjectRef) -> Option<SkipReason> {
        self.skipped_orphans
            .iter()
            .find(|s| &s.object == object)
            .map(|s| s.reason)
    }

    /// Returns the run duration, if it has completed.
    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|end| end - self.started_at)
    }
}
