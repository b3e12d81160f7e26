//! Run phase state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Phase of a reconcile run.
///
/// ```text
/// Stamping ──► Listing ──► Sweeping ──► Done
///    │  │         │  │         │
///    │  └─────────┼──┴─► Done  │
///    └────────────┴────────────┴──► Failed
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    /// Applying desired objects with the run tag and scope.
    #[default]
    Stamping,
    /// Listing live objects in the deployment scope.
    Listing,
    /// Deleting orphans.
    Sweeping,
    /// Completed without stamping or deletion errors.
    Done,
    /// Completed with errors, or cancelled.
    Failed,
}

impl RunPhase {
    /// Returns true if this is a terminal phase.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if the transition from self to target is valid.
    ///
    /// `Done` may follow `Stamping` or `Listing` directly when the sweep is
    /// skipped or disabled.
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        match self {
            Self::Stamping => matches!(target, Self::Listing | Self::Done | Self::Failed),
            Self::Listing => matches!(target, Self::Sweeping | Self::Done | Self::Failed),
            Self::Sweeping => matches!(target, Self::Done | Self::Failed),
            Self::Done | Self::Failed => false,
        }
    }

    /// Returns the stable string form, used as a metric label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stamping => "stamping",
            Self::Listing => "listing",
            Self::Sweeping => "sweeping",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
