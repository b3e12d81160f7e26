//! Reconciler configuration.

use serde::{Deserialize, Serialize};

use kubesweep_core::{DeletePropagation, ResourceKind};

use crate::retry::RetryPolicy;
use crate::tag::MigrationPhase;

/// Upper bound for `parallelism`.
pub const MAX_PARALLELISM: usize = 256;

/// Process-wide reconciler settings.
///
/// Everything that used to be ambient state (migration phase, worker pool
/// size) is passed in here, so runs are deterministic under test.
///
/// # Example
///
/// ```rust
/// use kubesweep_gc::config::ReconcilerConfig;
/// use kubesweep_gc::tag::MigrationPhase;
///
/// let config = ReconcilerConfig {
///     migration_phase: MigrationPhase::AnnotationAndLabel,
///     parallelism: 16,
///     ..ReconcilerConfig::default()
/// };
/// assert!(config.validate().is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconcilerConfig {
    /// Where GC tags and scopes are written and how live objects are listed.
    pub migration_phase: MigrationPhase,

    /// Maximum concurrent cluster calls per phase.
    pub parallelism: usize,

    /// Bounds for retrying transient failures and apply conflicts.
    pub retry: RetryPolicy,

    /// Propagation policy sent with every orphan deletion.
    pub propagation: DeletePropagation,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            migration_phase: MigrationPhase::AnnotationOnly,
            parallelism: 8,
            retry: RetryPolicy::default(),
            propagation: DeletePropagation::Foreground,
        }
    }
}

impl ReconcilerConfig {
    /// Settings for local clusters and tests: sequential, no retries.
    #[must_use]
    pub fn development() -> Self {
        Self {
            parallelism: 1,
            retry: RetryPolicy::none(),
            ..Self::default()
        }
    }

    /// Settings for busy shared clusters: low parallelism, patient retries.
    #[must_use]
    pub fn conservative() -> Self {
        Self {
            parallelism: 4,
            retry: RetryPolicy {
                max_attempts: 8,
                max_conflict_retries: 5,
                base_backoff_ms: 250,
                max_backoff_ms: 30_000,
            },
            ..Self::default()
        }
    }

    /// Validates the settings are reasonable.
    ///
    /// Returns an error message if validation fails.
    #[must_use]
    pub fn validate(&self) -> Option<String> {
        if self.parallelism == 0 {
            return Some("parallelism must be at least 1".to_string());
        }
        if self.parallelism > MAX_PARALLELISM {
            return Some(format!(
                "parallelism ({}) cannot exceed {MAX_PARALLELISM}",
                self.parallelism
            ));
        }
        if self.retry.max_attempts == 0 {
            return Some("retry.max_attempts must be at least 1".to_string());
        }
        if self.retry.base_backoff_ms > self.retry.max_backoff_ms {
            return Some(format!(
                "retry.base_backoff_ms ({}) cannot exceed retry.max_backoff_ms ({})",
                self.retry.base_backoff_ms, self.retry.max_backoff_ms
            ));
        }
        None
    }
}

/// Per-run switches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Compute and report everything, but apply and delete nothing.
    pub dry_run: bool,

    /// Apply only; do not list or delete.
    pub skip_sweep: bool,

    /// Overrides [`ReconcilerConfig::parallelism`] for this run.
    pub parallelism: Option<usize>,

    /// Kinds to sweep instead of asking discovery.
    ///
    /// Kinds of the desired objects are always included.
    pub kinds: Option<Vec<ResourceKind>>,
}

impl RunOptions {
    /// Options for a dry run.
    #[must_use]
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReconcilerConfig::default();
        assert_eq!(config.migration_phase, MigrationPhase::AnnotationOnly);
        assert_eq!(config.parallelism, 8);
        assert_eq!(config.propagation, DeletePropagation::Foreground);
        assert!(config.validate().is_none());
    }

    #[test]
    fn test_presets_validate() {
        assert!(ReconcilerConfig::development().validate().is_none());
        assert!(ReconcilerConfig::conservative().validate().is_none());
        assert_eq!(ReconcilerConfig::development().parallelism, 1);
    }

    #[test]
    fn test_validation_parallelism() {
        let zero = ReconcilerConfig {
            parallelism: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_some());

        let huge = ReconcilerConfig {
            parallelism: MAX_PARALLELISM + 1,
            ..Default::default()
        };
        assert!(huge.validate().is_some());
    }

    #[test]
    fn test_validation_retry() {
        let mut config = ReconcilerConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_some());

        let mut config = ReconcilerConfig::default();
        config.retry.base_backoff_ms = 10_000;
        assert!(config.validate().is_some());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ReconcilerConfig =
            serde_json::from_str(r#"{"migrationPhase":"annotationAndLabel","parallelism":2}"#)
                .expect("parse");
        assert_eq!(config.migration_phase, MigrationPhase::AnnotationAndLabel);
        assert_eq!(config.parallelism, 2);
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = ReconcilerConfig::conservative();
        let json = serde_json::to_string(&config).expect("serialize");
        let parsed: ReconcilerConfig = serde_json::from_str(&json).expect("parse");
        assert_eq!(config, parsed);
    }
}
