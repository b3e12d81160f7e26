//! Apply-then-sweep reconciler.
//!
//! One run drives the GC cycle for a deployment scope:
//!
//! 1. **Stamping**: every desired object is written with the run tag and the
//!    scope, then applied. All stamps finish before anything is deleted.
//! 2. **Listing**: live objects of every relevant kind are listed and
//!    narrowed to the scope (label selector in phase 2, client-side filter in
//!    phase 1). A kind that cannot be listed is degraded and never swept.
//! 3. **Sweeping**: in-scope objects outside the desired set that carry an
//!    older tag are deleted. Everything else is reported as skipped.
//!
//! Per-object failures never abort sibling operations; they are collected in
//! the [`RunResult`]. Successful stamps are never rolled back.
//!
//! # Safety
//!
//! The run tag must differ from the previous run's tag for the same scope.
//! Reusing a tag makes the previous generation look current, so nothing it
//! left behind is deleted. This is not detected.

mod report;
mod state;

pub use report::{RunError, RunErrorKind, RunResult, SkippedObject};
pub use state::RunPhase;

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Once};
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use ulid::Ulid;

use kubesweep_core::observability::{object_span, reconcile_span};
use kubesweep_core::{
    ClusterAccessor, Error, ListSelector, ManagedObject, ObjectRef, ResourceKind,
};

use crate::config::{MAX_PARALLELISM, ReconcilerConfig, RunOptions};
use crate::eligibility::{SweepVerdict, sweep_verdict};
use crate::error::{GcError, Result};
use crate::keys::LABEL_GC_SCOPE;
use crate::metrics;
use crate::retry::{RetryError, retry_transient};
use crate::tag::{DeploymentScope, GcTag, MigrationPhase, read_scope, write_scope, write_tag};

static LABEL_LISTING_NOTICE: Once = Once::new();

/// Validated input of one run.
struct Plan {
    run_tag: String,
    scope: String,
    objects: Vec<ManagedObject>,
    identities: HashSet<ObjectRef>,
    kinds: Vec<ResourceKind>,
    parallelism: usize,
}

/// Reconciles a desired object set against the cluster and sweeps orphans.
///
/// # Example
///
/// ```rust,ignore
/// let reconciler = Reconciler::new(accessor, ReconcilerConfig::default())?;
/// let tag = GcTag::new("build-4812")?;
/// let scope = DeploymentScope::new("prod-eu")?;
///
/// // Preview first
/// let preview = reconciler
///     .reconcile(desired.clone(), &tag, &scope, RunOptions::dry_run())
///     .await?;
///
/// // Then apply and sweep
/// let result = reconciler
///     .reconcile(desired, &tag, &scope, RunOptions::default())
///     .await?;
/// ```
#[derive(Clone)]
pub struct Reconciler {
    accessor: Arc<dyn ClusterAccessor>,
    config: ReconcilerConfig,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("accessor", &"ClusterAccessor")
            .field("config", &self.config)
            .finish()
    }
}

impl Reconciler {
    /// Creates a new reconciler.
    ///
    /// # Errors
    ///
    /// Returns [`GcError::InvalidConfig`] if `config` fails validation.
    pub fn new(accessor: Arc<dyn ClusterAccessor>, config: ReconcilerConfig) -> Result<Self> {
        if let Some(message) = config.validate() {
            return Err(GcError::InvalidConfig { message });
        }
        Ok(Self { accessor, config })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Runs one reconcile cycle.
    ///
    /// # Errors
    ///
    /// Returns an error only for invalid input, before any cluster call:
    /// a tag or scope that cannot be written in the configured phase, a
    /// desired object without a name, duplicate desired identities, or an
    /// invalid parallelism override. Cluster failures are reported in the
    /// returned [`RunResult`].
    pub async fn reconcile(
        &self,
        desired: Vec<ManagedObject>,
        run_tag: &GcTag,
        scope: &DeploymentScope,
        options: RunOptions,
    ) -> Result<RunResult> {
        self.reconcile_with_cancellation(desired, run_tag, scope, options, CancellationToken::new())
            .await
    }

    /// Runs one reconcile cycle that stops issuing operations once `cancel`
    /// fires.
    ///
    /// In-flight calls complete; the run then ends [`RunPhase::Failed`] with
    /// a [`RunErrorKind::Cancelled`] error.
    ///
    /// # Errors
    ///
    /// See [`Reconciler::reconcile`].
    pub async fn reconcile_with_cancellation(
        &self,
        desired: Vec<ManagedObject>,
        run_tag: &GcTag,
        scope: &DeploymentScope,
        options: RunOptions,
        cancel: CancellationToken,
    ) -> Result<RunResult> {
        let plan = self.prepare(desired, run_tag, scope, &options)?;
        let run_id = Ulid::new().to_string();
        let span = reconcile_span(scope.as_str(), run_tag.as_str(), &run_id);

        Ok(self
            .execute(plan, run_id, &options, &cancel)
            .instrument(span)
            .await)
    }

    fn prepare(
        &self,
        desired: Vec<ManagedObject>,
        run_tag: &GcTag,
        scope: &DeploymentScope,
        options: &RunOptions,
    ) -> Result<Plan> {
        let phase = self.config.migration_phase;
        run_tag.ensure_writable(phase)?;
        scope.ensure_writable(phase)?;

        let parallelism = options.parallelism.unwrap_or(self.config.parallelism);
        if parallelism == 0 || parallelism > MAX_PARALLELISM {
            return Err(GcError::InvalidConfig {
                message: format!("parallelism override must be within 1..={MAX_PARALLELISM}"),
            });
        }

        let mut identities = HashSet::with_capacity(desired.len());
        let mut kinds = Vec::new();
        let mut objects = Vec::with_capacity(desired.len());

        for mut object in desired {
            if object.name().is_empty() {
                return Err(GcError::InvalidObject {
                    object: object.kind.clone(),
                    message: "metadata.name is required".into(),
                });
            }
            let key = object.object_ref();
            if !identities.insert(key.clone()) {
                return Err(GcError::DuplicateObject {
                    object: key.to_string(),
                });
            }

            write_tag(&mut object, run_tag.as_str(), phase);
            write_scope(&mut object, scope.as_str(), phase);
            kinds.push(object.resource_kind());
            objects.push(object);
        }

        Ok(Plan {
            run_tag: run_tag.to_string(),
            scope: scope.to_string(),
            objects,
            identities,
            kinds,
            parallelism,
        })
    }

    async fn execute(
        &self,
        plan: Plan,
        run_id: String,
        options: &RunOptions,
        cancel: &CancellationToken,
    ) -> RunResult {
        let start = Instant::now();
        let mut result = RunResult::new(run_id, &plan.run_tag, &plan.scope, options.dry_run);

        tracing::info!(
            desired = plan.objects.len(),
            migration_phase = %self.config.migration_phase,
            parallelism = plan.parallelism,
            dry_run = options.dry_run,
            skip_sweep = options.skip_sweep,
            metric = "kubesweep_run_started",
            "starting reconcile run"
        );

        self.stamp(plan.objects, plan.parallelism, options.dry_run, cancel, &mut result)
            .await;

        if options.skip_sweep || cancel.is_cancelled() {
            return finish(result, cancel, start);
        }

        advance(&mut result, RunPhase::Listing);
        let Some(live) = self
            .list_scope(&plan.scope, &plan.kinds, options, plan.parallelism, cancel, &mut result)
            .await
        else {
            return finish(result, cancel, start);
        };
        if cancel.is_cancelled() {
            return finish(result, cancel, start);
        }

        advance(&mut result, RunPhase::Sweeping);
        self.sweep(
            live,
            &plan.identities,
            &plan.run_tag,
            plan.parallelism,
            options.dry_run,
            cancel,
            &mut result,
        )
        .await;

        finish(result, cancel, start)
    }

    // ------------------------------------------------------------------------
    // Stamping
    // ------------------------------------------------------------------------

    async fn stamp(
        &self,
        objects: Vec<ManagedObject>,
        parallelism: usize,
        dry_run: bool,
        cancel: &CancellationToken,
        result: &mut RunResult,
    ) {
        let outcomes: Vec<_> = stream::iter(objects)
            .map(|object| self.stamp_one(object, dry_run, cancel))
            .buffer_unordered(parallelism)
            .collect()
            .await;

        for outcome in outcomes.into_iter().flatten() {
            match outcome {
                Ok(key) => result.applied.push(key),
                Err(error) => record_error(result, error),
            }
        }
        result.applied.sort();
        result.applied_count = result.applied.len();

        tracing::info!(
            applied = result.applied_count,
            dry_run,
            errors = result.errors.len(),
            "stamping finished"
        );
    }

    /// Applies one stamped object. `None` means it was never issued because
    /// the run was cancelled.
    async fn stamp_one(
        &self,
        object: ManagedObject,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> Option<std::result::Result<ObjectRef, RunError>> {
        if cancel.is_cancelled() {
            return None;
        }
        let key = object.object_ref();
        let span = object_span("apply", &key.to_string());

        async move {
            if dry_run {
                tracing::debug!("dry run: would apply");
                return Some(Ok(key));
            }
            match self.apply_resolving_conflicts(&object, cancel).await {
                Ok(_) => {
                    tracing::debug!("applied");
                    Some(Ok(key))
                }
                Err(RetryError::Cancelled) => None,
                Err(RetryError::Failed { attempts, source }) => Some(Err(RunError::for_object(
                    RunPhase::Stamping,
                    classify(&source),
                    key,
                    format!("apply failed after {attempts} attempt(s): {source}"),
                ))),
            }
        }
        .instrument(span)
        .await
    }

    /// Applies `object`, re-fetching the live `resourceVersion` after each
    /// conflict up to `max_conflict_retries` times.
    async fn apply_resolving_conflicts(
        &self,
        object: &ManagedObject,
        cancel: &CancellationToken,
    ) -> std::result::Result<ManagedObject, RetryError> {
        let policy = &self.config.retry;
        let accessor = self.accessor.as_ref();
        let key = object.object_ref();
        let mut candidate = object.clone();
        let mut conflicts = 0;

        loop {
            let outcome =
                retry_transient(policy, cancel, "apply", || accessor.apply(&candidate)).await;
            match outcome {
                Err(RetryError::Failed { source, .. })
                    if source.is_conflict() && conflicts < policy.max_conflict_retries =>
                {
                    if cancel.is_cancelled() {
                        return Err(RetryError::Cancelled);
                    }
                    conflicts += 1;
                    metrics::record_retry("apply_conflict");
                    tracing::warn!(
                        conflicts,
                        error = %source,
                        "apply conflict, re-fetching live object"
                    );
                    let live = retry_transient(policy, cancel, "get", || accessor.get(&key)).await?;
                    candidate.metadata.resource_version =
                        live.and_then(|l| l.metadata.resource_version);
                    if cancel.is_cancelled() {
                        return Err(RetryError::Cancelled);
                    }
                }
                other => return other,
            }
        }
    }

    // ------------------------------------------------------------------------
    // Listing
    // ------------------------------------------------------------------------

    /// Lists live objects in `scope`, keyed by identity.
    ///
    /// Returns `None` if discovery failed, which disables the sweep.
    async fn list_scope(
        &self,
        scope: &str,
        desired_kinds: &[ResourceKind],
        options: &RunOptions,
        parallelism: usize,
        cancel: &CancellationToken,
        result: &mut RunResult,
    ) -> Option<BTreeMap<ObjectRef, ManagedObject>> {
        let policy = &self.config.retry;
        let accessor = self.accessor.as_ref();

        let discovered = match &options.kinds {
            Some(kinds) => kinds.clone(),
            None => match retry_transient(policy, cancel, "discover", || accessor.discover()).await
            {
                Ok(kinds) => kinds,
                Err(RetryError::Cancelled) => return None,
                Err(RetryError::Failed { attempts, source }) => {
                    record_error(
                        result,
                        RunError::for_run(
                            RunPhase::Listing,
                            RunErrorKind::Access,
                            format!(
                                "discovery failed after {attempts} attempt(s), sweep disabled: {source}"
                            ),
                        ),
                    );
                    return None;
                }
            },
        };
        let kinds = merge_kinds(discovered, desired_kinds);

        let phase = self.config.migration_phase;
        if phase.lists_by_label() {
            LABEL_LISTING_NOTICE.call_once(|| {
                tracing::warn!(
                    migration_phase = %phase,
                    "listing by scope label: objects last written with annotations only \
                     are not swept until re-applied in this phase"
                );
            });
        }
        let selector = &scope_selector(phase, scope);
        tracing::debug!(kinds = kinds.len(), selector = %selector, "listing scope");

        let outcomes: Vec<_> = stream::iter(kinds)
            .map(move |kind| async move {
                if cancel.is_cancelled() {
                    return None;
                }
                let listed =
                    retry_transient(policy, cancel, "list", || accessor.list(&kind, selector)).await;
                Some((kind, listed))
            })
            .buffer_unordered(parallelism)
            .collect()
            .await;

        let mut live = BTreeMap::new();
        for (kind, listed) in outcomes.into_iter().flatten() {
            match listed {
                Ok(objects) => {
                    for object in objects {
                        if read_scope(&object) == Some(scope) {
                            live.insert(object.object_ref(), object);
                        }
                    }
                }
                Err(RetryError::Cancelled) => {}
                Err(RetryError::Failed { attempts, source }) => {
                    record_error(
                        result,
                        RunError::for_kind(
                            RunPhase::Listing,
                            RunErrorKind::PartialList,
                            kind.clone(),
                            format!("list failed after {attempts} attempt(s): {source}"),
                        ),
                    );
                    result.degraded_kinds.push(kind);
                }
            }
        }
        result.degraded_kinds.sort();

        tracing::info!(
            in_scope = live.len(),
            degraded_kinds = result.degraded_kinds.len(),
            "listing finished"
        );
        Some(live)
    }

    // ------------------------------------------------------------------------
    // Sweeping
    // ------------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    async fn sweep(
        &self,
        live: BTreeMap<ObjectRef, ManagedObject>,
        desired: &HashSet<ObjectRef>,
        run_tag: &str,
        parallelism: usize,
        dry_run: bool,
        cancel: &CancellationToken,
        result: &mut RunResult,
    ) {
        for (key, object) in live {
            if desired.contains(&key) {
                continue;
            }
            match sweep_verdict(&object, run_tag) {
                SweepVerdict::Delete => result.orphans.push(key),
                SweepVerdict::Skip(reason) => {
                    tracing::debug!(object = %key, reason = %reason, "keeping object");
                    metrics::record_skipped(reason.as_str());
                    result
                        .skipped_orphans
                        .push(SkippedObject { object: key, reason });
                }
            }
        }

        if dry_run {
            tracing::info!(
                orphans = result.orphans.len(),
                skipped = result.skipped_orphans.len(),
                "dry run: would delete orphans"
            );
            return;
        }

        let outcomes: Vec<_> = stream::iter(result.orphans.clone())
            .map(|key| self.delete_one(key, cancel))
            .buffer_unordered(parallelism)
            .collect()
            .await;

        for outcome in outcomes.into_iter().flatten() {
            match outcome {
                Ok(()) => result.deleted_count += 1,
                Err(error) => record_error(result, error),
            }
        }

        tracing::info!(
            deleted = result.deleted_count,
            orphans = result.orphans.len(),
            skipped = result.skipped_orphans.len(),
            "sweeping finished"
        );
    }

    /// Deletes one orphan. An object that is already gone counts as deleted.
    async fn delete_one(
        &self,
        key: ObjectRef,
        cancel: &CancellationToken,
    ) -> Option<std::result::Result<(), RunError>> {
        if cancel.is_cancelled() {
            return None;
        }
        let span = object_span("delete", &key.to_string());
        let accessor = self.accessor.as_ref();
        let propagation = self.config.propagation;

        async move {
            let deleted = retry_transient(&self.config.retry, cancel, "delete", || {
                accessor.delete(&key, propagation)
            })
            .await;
            match deleted {
                Ok(()) => {
                    tracing::info!(propagation = %propagation, "deleted orphan");
                    Some(Ok(()))
                }
                Err(RetryError::Failed { source, .. }) if source.is_not_found() => {
                    tracing::debug!("orphan already gone");
                    Some(Ok(()))
                }
                Err(RetryError::Cancelled) => None,
                Err(RetryError::Failed { attempts, source }) => Some(Err(RunError::for_object(
                    RunPhase::Sweeping,
                    classify(&source),
                    key,
                    format!("delete failed after {attempts} attempt(s): {source}"),
                ))),
            }
        }
        .instrument(span)
        .await
    }
}

/// Runs one reconcile cycle with default settings for `phase`.
///
/// # Errors
///
/// See [`Reconciler::reconcile`].
pub async fn reconcile(
    accessor: Arc<dyn ClusterAccessor>,
    desired: Vec<ManagedObject>,
    run_tag: &GcTag,
    scope: &DeploymentScope,
    phase: MigrationPhase,
    options: RunOptions,
) -> Result<RunResult> {
    let config = ReconcilerConfig {
        migration_phase: phase,
        ..ReconcilerConfig::default()
    };
    Reconciler::new(accessor, config)?
        .reconcile(desired, run_tag, scope, options)
        .await
}

/// Moves the run to a terminal phase and emits the summary.
fn finish(mut result: RunResult, cancel: &CancellationToken, start: Instant) -> RunResult {
    if cancel.is_cancelled() && !result.was_cancelled() {
        let phase = result.phase;
        record_error(
            &mut result,
            RunError::for_run(phase, RunErrorKind::Cancelled, "run cancelled"),
        );
    }

    let failed = result.errors.iter().any(|e| {
        e.kind == RunErrorKind::Cancelled
            || matches!(e.phase, RunPhase::Stamping | RunPhase::Sweeping)
    });
    advance(
        &mut result,
        if failed { RunPhase::Failed } else { RunPhase::Done },
    );
    result.completed_at = Some(Utc::now());

    let duration_secs = start.elapsed().as_secs_f64();
    metrics::record_run_completion(
        result.phase.as_str(),
        u64::try_from(result.applied_count).unwrap_or(u64::MAX),
        u64::try_from(result.deleted_count).unwrap_or(u64::MAX),
        duration_secs,
    );

    tracing::info!(
        phase = %result.phase,
        dry_run = result.dry_run,
        applied = result.applied_count,
        deleted = result.deleted_count,
        orphans = result.orphans.len(),
        skipped = result.skipped_orphans.len(),
        degraded = result.is_degraded(),
        errors_count = result.errors.len(),
        duration_secs,
        metric = "kubesweep_run_completed",
        "reconcile run completed"
    );

    result
}

fn advance(result: &mut RunResult, target: RunPhase) {
    debug_assert!(
        result.phase.can_transition_to(target),
        "invalid run phase transition {} -> {target}",
        result.phase
    );
    tracing::debug!(from = %result.phase, to = %target, "run phase transition");
    result.phase = target;
}

fn record_error(result: &mut RunResult, error: RunError) {
    tracing::warn!(
        phase = %error.phase,
        kind = %error.kind,
        error = %error,
        "reconcile error"
    );
    metrics::record_error(error.phase.as_str());
    result.errors.push(error);
}

fn classify(error: &Error) -> RunErrorKind {
    if error.is_conflict() {
        RunErrorKind::Conflict
    } else {
        RunErrorKind::Access
    }
}

/// Returns the list selector for `scope` in `phase`.
///
/// Phase 1 objects carry the scope only as an annotation, so they must be
/// listed unfiltered and narrowed client-side.
fn scope_selector(phase: MigrationPhase, scope: &str) -> ListSelector {
    if phase.lists_by_label() {
        ListSelector::label(LABEL_GC_SCOPE, scope)
    } else {
        ListSelector::All
    }
}

/// Unions discovered and desired kinds, one entry per group and kind.
///
/// Discovered entries win, so the served version is used for listing.
fn merge_kinds(discovered: Vec<ResourceKind>, desired: &[ResourceKind]) -> Vec<ResourceKind> {
    let mut by_name = BTreeMap::new();
    for kind in discovered.into_iter().chain(desired.iter().cloned()) {
        by_name
            .entry((kind.group.clone(), kind.kind.clone()))
            .or_insert(kind);
    }
    by_name.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eligibility::SkipReason;
    use crate::keys::{ANNOTATION_GC_STRATEGY, GC_STRATEGY_IGNORE, LABEL_GC_TAG};
    use crate::tag::read_tag;
    use kubesweep_core::{MemoryCluster, Metadata, OwnerReference};

    fn cm(name: &str) -> ManagedObject {
        ManagedObject::new("v1", "ConfigMap", Some("default"), name)
    }

    fn tag(value: &str) -> GcTag {
        GcTag::new(value).expect("tag")
    }

    fn prod() -> DeploymentScope {
        DeploymentScope::new("prod").expect("scope")
    }

    /// Seeds a live object as an earlier run would have left it.
    fn seed(cluster: &MemoryCluster, mut object: ManagedObject, tag: &str, scope: &str) {
        write_tag(&mut object, tag, MigrationPhase::AnnotationOnly);
        write_scope(&mut object, scope, MigrationPhase::AnnotationOnly);
        cluster.insert(object).expect("seed");
    }

    fn reconciler(cluster: &MemoryCluster) -> Reconciler {
        Reconciler::new(Arc::new(cluster.clone()), ReconcilerConfig::development())
            .expect("reconciler")
    }

    #[tokio::test]
    async fn test_stamps_and_applies_desired_objects() {
        let cluster = MemoryCluster::new();
        let result = reconciler(&cluster)
            .reconcile(vec![cm("a"), cm("b")], &tag("t1"), &prod(), RunOptions::default())
            .await
            .expect("run");

        assert_eq!(result.phase, RunPhase::Done);
        assert_eq!(result.applied_count, 2);
        assert!(result.completed_at.is_some());

        let live = cluster
            .snapshot(&cm("a").object_ref())
            .expect("snapshot")
            .expect("applied");
        assert_eq!(read_tag(&live), Some("t1"));
        assert_eq!(read_scope(&live), Some("prod"));
        assert_eq!(live.label(LABEL_GC_TAG), None);
    }

    #[tokio::test]
    async fn test_deletes_previous_generation_orphans() {
        let cluster = MemoryCluster::new();
        seed(&cluster, cm("a"), "t1", "prod");
        seed(&cluster, cm("dropped"), "t1", "prod");

        let result = reconciler(&cluster)
            .reconcile(vec![cm("a")], &tag("t2"), &prod(), RunOptions::default())
            .await
            .expect("run");

        assert!(result.is_success());
        assert_eq!(result.orphans, vec![cm("dropped").object_ref()]);
        assert_eq!(result.deleted_count, 1);
        assert_eq!(cluster.object_refs().expect("refs"), vec![cm("a").object_ref()]);
    }

    #[tokio::test]
    async fn test_opt_outs_and_untagged_objects_survive() {
        let cluster = MemoryCluster::new();

        let mut ignored = cm("ignored");
        ignored.set_annotation(ANNOTATION_GC_STRATEGY, GC_STRATEGY_IGNORE);
        seed(&cluster, ignored, "t1", "prod");

        let mut owned = cm("owned");
        owned.metadata.owner_references = Some(vec![OwnerReference {
            kind: "Deployment".into(),
            name: "web".into(),
            controller: Some(true),
            ..OwnerReference::default()
        }]);
        seed(&cluster, owned, "t1", "prod");

        let mut untagged = cm("untagged");
        write_scope(&mut untagged, "prod", MigrationPhase::AnnotationOnly);
        cluster.insert(untagged).expect("insert");

        let result = reconciler(&cluster)
            .reconcile(vec![], &tag("t2"), &prod(), RunOptions::default())
            .await
            .expect("run");

        assert!(result.is_success());
        assert!(result.orphans.is_empty());
        assert!(result.errors.is_empty());
        assert_eq!(
            result.skip_reason(&cm("ignored").object_ref()),
            Some(SkipReason::StrategyIgnore)
        );
        assert_eq!(
            result.skip_reason(&cm("owned").object_ref()),
            Some(SkipReason::ControllerOwned)
        );
        assert_eq!(
            result.skip_reason(&cm("untagged").object_ref()),
            Some(SkipReason::Untagged)
        );
        assert_eq!(cluster.object_refs().expect("refs").len(), 3);
    }

    #[tokio::test]
    async fn test_other_scopes_are_untouched() {
        let cluster = MemoryCluster::new();
        seed(&cluster, cm("staging-app"), "t1", "staging");
        cluster.insert(cm("unmanaged")).expect("insert");

        let result = reconciler(&cluster)
            .reconcile(vec![], &tag("t2"), &prod(), RunOptions::default())
            .await
            .expect("run");

        assert!(result.orphans.is_empty());
        assert!(result.skipped_orphans.is_empty());
        assert_eq!(cluster.object_refs().expect("refs").len(), 2);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let cluster = MemoryCluster::new();
        seed(&cluster, cm("dropped"), "t1", "prod");

        let result = reconciler(&cluster)
            .reconcile(vec![cm("new")], &tag("t2"), &prod(), RunOptions::dry_run())
            .await
            .expect("run");

        assert!(result.dry_run);
        assert_eq!(result.applied_count, 1);
        assert_eq!(result.orphans, vec![cm("dropped").object_ref()]);
        assert_eq!(result.deleted_count, 0);
        assert_eq!(
            cluster.object_refs().expect("refs"),
            vec![cm("dropped").object_ref()]
        );
    }

    #[tokio::test]
    async fn test_skip_sweep_only_applies() {
        let cluster = MemoryCluster::new();
        seed(&cluster, cm("dropped"), "t1", "prod");

        let options = RunOptions {
            skip_sweep: true,
            ..RunOptions::default()
        };
        let result = reconciler(&cluster)
            .reconcile(vec![cm("new")], &tag("t2"), &prod(), options)
            .await
            .expect("run");

        assert_eq!(result.phase, RunPhase::Done);
        assert!(result.orphans.is_empty());
        assert_eq!(cluster.object_refs().expect("refs").len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_input_is_rejected_before_io() {
        let cluster = MemoryCluster::new();
        let reconciler = reconciler(&cluster);

        let err = reconciler
            .reconcile(vec![cm("a"), cm("a")], &tag("t1"), &prod(), RunOptions::default())
            .await
            .expect_err("duplicate");
        assert!(matches!(err, GcError::DuplicateObject { .. }));

        let mut nameless = cm("x");
        nameless.metadata.name = None;
        let err = reconciler
            .reconcile(vec![nameless], &tag("t1"), &prod(), RunOptions::default())
            .await
            .expect_err("nameless");
        assert!(matches!(err, GcError::InvalidObject { .. }));

        let options = RunOptions {
            parallelism: Some(0),
            ..RunOptions::default()
        };
        let err = reconciler
            .reconcile(vec![cm("a")], &tag("t1"), &prod(), options)
            .await
            .expect_err("parallelism");
        assert!(matches!(err, GcError::InvalidConfig { .. }));

        assert!(cluster.object_refs().expect("refs").is_empty());
    }

    #[tokio::test]
    async fn test_label_phase_requires_label_safe_tags() {
        let cluster = MemoryCluster::new();
        let err = reconcile(
            Arc::new(cluster.clone()),
            vec![cm("a")],
            &tag("deploy at 10:00"),
            &prod(),
            MigrationPhase::AnnotationAndLabel,
            RunOptions::default(),
        )
        .await
        .expect_err("not a label value");
        assert!(matches!(err, GcError::InvalidTag { .. }));
        assert!(cluster.object_refs().expect("refs").is_empty());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ReconcilerConfig {
            parallelism: 0,
            ..ReconcilerConfig::default()
        };
        let err = Reconciler::new(Arc::new(MemoryCluster::new()), config).expect_err("invalid");
        assert!(matches!(err, GcError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_issues_nothing() {
        let cluster = MemoryCluster::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = reconciler(&cluster)
            .reconcile_with_cancellation(
                vec![cm("a")],
                &tag("t1"),
                &prod(),
                RunOptions::default(),
                cancel,
            )
            .await
            .expect("run");

        assert_eq!(result.phase, RunPhase::Failed);
        assert!(result.was_cancelled());
        assert_eq!(result.applied_count, 0);
        assert!(cluster.object_refs().expect("refs").is_empty());
    }

    #[test]
    fn test_merge_kinds_prefers_discovered_version() {
        let discovered = vec![
            ResourceKind::new("apps/v1", "Deployment", true),
            ResourceKind::new("v1", "ConfigMap", true),
        ];
        let desired = vec![
            ResourceKind::new("apps/v1beta2", "Deployment", true),
            ResourceKind::new("batch/v1", "Job", true),
        ];

        let merged = merge_kinds(discovered, &desired);
        assert_eq!(merged.len(), 3);
        let deployment = merged
            .iter()
            .find(|k| k.kind == "Deployment")
            .expect("deployment");
        assert_eq!(deployment.version, "v1");
    }

    #[test]
    fn test_scope_selector_per_phase() {
        assert_eq!(
            scope_selector(MigrationPhase::AnnotationOnly, "prod"),
            ListSelector::All
        );
        assert_eq!(
            scope_selector(MigrationPhase::AnnotationAndLabel, "prod"),
            ListSelector::label(LABEL_GC_SCOPE, "prod")
        );
    }
}
