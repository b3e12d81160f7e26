//! Shared test utilities for kubesweep integration tests.
//!
//! This crate provides:
//! - [`TracingCluster`]: In-memory cluster with operation recording and
//!   failure injection
//! - [`TestContext`]: Pre-configured test environment
//! - Factory functions for creating test objects
//! - Custom assertion helpers
//!
//! # Example
//!
//! ```rust,ignore
//! use kubesweep_test_utils::{TestContext, config_map, assert_run_succeeded};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let ctx = TestContext::new();
//!     ctx.seed_tagged(config_map("old"), "t1");
//!     // ... run test ...
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod assertions;
pub mod cluster;
pub mod fixtures;

pub use assertions::*;
pub use cluster::*;
pub use fixtures::*;

/// Initialize test logging (safe to call from every test).
///
/// Compact output through the test writer, `kubesweep_gc=debug` unless
/// `RUST_LOG` says otherwise.
pub fn init_test_logging() {
    use kubesweep_core::observability::{LogFormat, LogSettings, init_logging_with};

    let _ = init_logging_with(&LogSettings {
        format: LogFormat::Compact,
        default_filter: "info,kubesweep_gc=debug".into(),
        test_writer: true,
    });
}
