//! GC eligibility predicate.
//!
//! [`evaluate`] answers one question: may this object be deleted by a GC run
//! that asks about `tag`? Checks short-circuit in a fixed order:
//!
//! 1. strategy `ignore`
//! 2. controller-owned
//! 3. no effective tag
//! 4. effective tag differs from `tag` (exact, case-sensitive)
//!
//! The predicate is symmetric in the tag; whether `tag` means "current" or
//! "stale" is decided by the caller. [`sweep_verdict`] is that caller for the
//! sweep phase.

use std::fmt;

use serde::{Deserialize, Serialize};

use kubesweep_core::{ManagedObject, Metadata};

use crate::ownership::is_controller_owned;
use crate::tag::{GcStrategy, read_strategy, read_tag};

/// Outcome of [`evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Eligibility {
    /// The object carries the requested tag and may be deleted.
    Eligible,
    /// The object opted out with the `ignore` strategy.
    Ignored,
    /// Another controller owns the object.
    ControllerOwned,
    /// The object was never tagged.
    Untagged,
    /// The object carries a different tag.
    TagMismatch,
}

impl Eligibility {
    /// Returns true for [`Eligibility::Eligible`].
    #[must_use]
    pub const fn is_eligible(self) -> bool {
        matches!(self, Self::Eligible)
    }
}

/// Classifies `object` against `tag`.
#[must_use]
pub fn evaluate<M: Metadata + ?Sized>(object: &M, tag: &str) -> Eligibility {
    if read_strategy(object) == GcStrategy::Ignore {
        return Eligibility::Ignored;
    }
    if is_controller_owned(object) {
        return Eligibility::ControllerOwned;
    }
    match read_tag(object) {
        None => Eligibility::Untagged,
        Some(stored) if stored == tag => Eligibility::Eligible,
        Some(_) => Eligibility::TagMismatch,
    }
}

/// Returns true if a GC run for `tag` may delete `object`.
#[must_use]
pub fn eligible_for_gc<M: Metadata + ?Sized>(object: &M, tag: &str) -> bool {
    evaluate(object, tag).is_eligible()
}

/// Why an in-scope object outside the desired set was kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The object opted out with the `ignore` strategy.
    StrategyIgnore,
    /// Another controller owns the object.
    ControllerOwned,
    /// The object carries the scope but no GC tag.
    Untagged,
    /// The object already carries this run's tag.
    CurrentGeneration,
    /// The cluster is already deleting the object.
    Terminating,
}

impl SkipReason {
    /// Returns the stable string form, used as a metric label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StrategyIgnore => "strategy_ignore",
            Self::ControllerOwned => "controller_owned",
            Self::Untagged => "untagged",
            Self::CurrentGeneration => "current_generation",
            Self::Terminating => "terminating",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sweep-time decision for a live object outside the desired set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepVerdict {
    /// The object is an orphan of an earlier generation.
    Delete,
    /// The object stays.
    Skip(SkipReason),
}

/// Decides whether a sweep for `run_tag` deletes `object`.
///
/// The caller has already established that `object` is in the deployment
/// scope and not part of the desired set. An object is deleted iff it is
/// tagged, its tag differs from `run_tag`, its strategy is not `ignore` and
/// it is not controller-owned.
#[must_use]
pub fn sweep_verdict(object: &ManagedObject, run_tag: &str) -> SweepVerdict {
    if object.is_terminating() {
        return SweepVerdict::Skip(SkipReason::Terminating);
    }
    // A mismatch against the run tag is exactly the stale-generation case.
    match evaluate(object, run_tag) {
        Eligibility::TagMismatch => SweepVerdict::Delete,
        Eligibility::Eligible => SweepVerdict::Skip(SkipReason::CurrentGeneration),
        Eligibility::Ignored => SweepVerdict::Skip(SkipReason::StrategyIgnore),
        Eligibility::ControllerOwned => SweepVerdict::Skip(SkipReason::ControllerOwned),
        Eligibility::Untagged => SweepVerdict::Skip(SkipReason::Untagged),
    }
}
