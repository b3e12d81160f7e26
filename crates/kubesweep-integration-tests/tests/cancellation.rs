//! Cooperative cancellation of reconcile runs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use kubesweep_gc::{ReconcilerConfig, RetryPolicy, RunErrorKind, RunOptions, RunPhase};
use kubesweep_gc::tag::read_tag;
use kubesweep_test_utils::{OpKind, TestContext, assert_live, config_map};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn cancellation_stops_issuing_new_operations() {
    let ctx = TestContext::new();
    ctx.seed_tagged(config_map("dropped"), "old");

    let cancel = CancellationToken::new();
    ctx.cluster.cancel_on_apply(2, cancel.clone());

    let desired: Vec<_> = (0..5).map(|i| config_map(&format!("cm-{i}"))).collect();
    let result = ctx
        .reconciler()
        .reconcile_with_cancellation(
            desired,
            &TestContext::tag("new"),
            &ctx.scope,
            RunOptions::default(),
            cancel,
        )
        .await
        .expect("run");

    assert_eq!(result.phase, RunPhase::Failed);
    assert!(result.was_cancelled());
    // The in-flight apply completes; nothing after it starts.
    assert_eq!(result.applied_count, 2);
    assert_eq!(ctx.cluster.count(OpKind::Apply), 2);
    assert_eq!(ctx.cluster.count(OpKind::List), 0);
    assert_eq!(ctx.cluster.count(OpKind::Delete), 0);
    assert_live(&ctx.cluster, &config_map("dropped").object_ref());
}

#[tokio::test]
async fn cancellation_stops_conflict_resolution() {
    let ctx = TestContext::new();
    ctx.seed_tagged(config_map("a"), "old");
    ctx.cluster.conflict_on_apply(config_map("a").object_ref(), 1);

    let cancel = CancellationToken::new();
    ctx.cluster.cancel_on_apply(1, cancel.clone());

    let config = ReconcilerConfig {
        parallelism: 1,
        retry: RetryPolicy {
            max_conflict_retries: 3,
            ..RetryPolicy::none()
        },
        ..ReconcilerConfig::development()
    };
    let result = ctx
        .reconciler_with(config)
        .reconcile_with_cancellation(
            vec![config_map("a")],
            &TestContext::tag("new"),
            &ctx.scope,
            RunOptions::default(),
            cancel,
        )
        .await
        .expect("run");

    assert_eq!(result.phase, RunPhase::Failed);
    assert!(result.was_cancelled());
    assert_eq!(result.applied_count, 0);
    assert_eq!(result.errors_of_kind(RunErrorKind::Conflict).count(), 0);
    // No re-fetch and no reapply once the token has fired.
    assert_eq!(ctx.cluster.count(OpKind::Apply), 1);
    assert_eq!(ctx.cluster.count(OpKind::Get), 0);

    let live = ctx
        .cluster
        .live(&config_map("a").object_ref())
        .expect("live");
    assert_eq!(read_tag(&live), Some("old"));
}

#[tokio::test]
async fn pre_cancelled_run_touches_nothing() {
    let ctx = TestContext::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = ctx
        .reconciler()
        .reconcile_with_cancellation(
            vec![config_map("a")],
            &TestContext::tag("new"),
            &ctx.scope,
            RunOptions::default(),
            cancel,
        )
        .await
        .expect("run");

    assert_eq!(result.phase, RunPhase::Failed);
    assert_eq!(result.errors_of_kind(RunErrorKind::Cancelled).count(), 1);
    assert!(ctx.cluster.operations().is_empty());
    assert!(result.completed_at.is_some());
}

#[tokio::test]
async fn cancellation_interrupts_retry_backoff() {
    let ctx = TestContext::new();
    ctx.cluster.fail_transient(OpKind::Apply, 100);

    let config = ReconcilerConfig {
        retry: RetryPolicy {
            max_attempts: 10,
            base_backoff_ms: 60_000,
            max_backoff_ms: 60_000,
            ..RetryPolicy::default()
        },
        ..ReconcilerConfig::development()
    };

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        ctx.reconciler_with(config).reconcile_with_cancellation(
            vec![config_map("a")],
            &TestContext::tag("new"),
            &ctx.scope,
            RunOptions::default(),
            cancel,
        ),
    )
    .await
    .expect("backoff sleep must not outlive cancellation")
    .expect("run");

    assert_eq!(result.phase, RunPhase::Failed);
    assert!(result.was_cancelled());
    assert_eq!(result.errors_of_kind(RunErrorKind::Access).count(), 0);
    assert_eq!(ctx.cluster.count(OpKind::Apply), 1);
}

#[tokio::test]
async fn cancellation_during_discovery_is_not_degraded() {
    let ctx = TestContext::new();
    ctx.seed_tagged(config_map("dropped"), "old");
    ctx.cluster.fail_transient(OpKind::Discover, 100);

    let config = ReconcilerConfig {
        retry: RetryPolicy {
            max_attempts: 10,
            base_backoff_ms: 10_000,
            max_backoff_ms: 10_000,
            ..RetryPolicy::default()
        },
        ..ReconcilerConfig::development()
    };

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        ctx.reconciler_with(config).reconcile_with_cancellation(
            vec![config_map("a")],
            &TestContext::tag("new"),
            &ctx.scope,
            RunOptions::default(),
            cancel,
        ),
    )
    .await
    .expect("backoff sleep must not outlive cancellation")
    .expect("run");

    assert_eq!(result.phase, RunPhase::Failed);
    assert!(result.was_cancelled());
    assert!(!result.is_degraded());
    assert!(result.degraded_kinds.is_empty());
    assert_eq!(result.applied_count, 1);
    assert_eq!(ctx.cluster.count(OpKind::Discover), 1);
    assert_eq!(ctx.cluster.count(OpKind::List), 0);
    assert_live(&ctx.cluster, &config_map("dropped").object_ref());
}
