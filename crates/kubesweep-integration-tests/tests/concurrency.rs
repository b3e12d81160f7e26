//! Bounded fan-out of cluster calls.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use kubesweep_gc::{ReconcilerConfig, RunOptions};
use kubesweep_test_utils::{
    OpKind, TestContext, TracingCluster, assert_run_succeeded, config_map,
};

const LATENCY: Duration = Duration::from_millis(10);

fn slow_context() -> TestContext {
    TestContext {
        cluster: TracingCluster::with_latency(LATENCY),
        ..TestContext::new()
    }
}

fn with_parallelism(parallelism: usize) -> ReconcilerConfig {
    ReconcilerConfig {
        parallelism,
        ..ReconcilerConfig::development()
    }
}

#[tokio::test]
async fn applies_never_exceed_parallelism() {
    let ctx = slow_context();
    let desired: Vec<_> = (0..12).map(|i| config_map(&format!("cm-{i}"))).collect();

    let options = RunOptions {
        skip_sweep: true,
        ..RunOptions::default()
    };
    let result = ctx
        .reconciler_with(with_parallelism(3))
        .reconcile(desired, &TestContext::tag("new"), &ctx.scope, options)
        .await
        .expect("run");

    assert_run_succeeded(&result);
    assert_eq!(ctx.cluster.count(OpKind::Apply), 12);
    let peak = ctx.cluster.peak_in_flight();
    assert!(peak <= 3, "peak {peak} exceeds parallelism");
    assert!(peak > 1, "applies were not issued concurrently");
}

#[tokio::test]
async fn deletes_never_exceed_parallelism() {
    let ctx = slow_context();
    for i in 0..10 {
        ctx.seed_tagged(config_map(&format!("dropped-{i}")), "old");
    }

    let result = ctx
        .reconciler_with(with_parallelism(4))
        .reconcile(vec![], &TestContext::tag("new"), &ctx.scope, RunOptions::default())
        .await
        .expect("run");

    assert_run_succeeded(&result);
    assert_eq!(result.deleted_count, 10);
    let peak = ctx.cluster.peak_in_flight();
    assert!(peak <= 4, "peak {peak} exceeds parallelism");
    assert!(peak > 1, "deletes were not issued concurrently");
}

#[tokio::test]
async fn parallelism_override_of_one_serializes_calls() {
    let ctx = slow_context();
    ctx.seed_tagged(config_map("dropped"), "old");
    let desired: Vec<_> = (0..4).map(|i| config_map(&format!("cm-{i}"))).collect();

    let options = RunOptions {
        parallelism: Some(1),
        ..RunOptions::default()
    };
    let result = ctx
        .reconciler_with(with_parallelism(8))
        .reconcile(desired, &TestContext::tag("new"), &ctx.scope, options)
        .await
        .expect("run");

    assert_run_succeeded(&result);
    assert_eq!(result.deleted_count, 1);
    assert_eq!(ctx.cluster.peak_in_flight(), 1);
}
