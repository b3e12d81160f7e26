//! # kubesweep-gc
//!
//! Garbage collection for declaratively applied cluster objects.
//!
//! Every apply run stamps its objects with a GC tag that identifies the
//! run and a deployment scope that identifies the target. The next run
//! with a new tag deletes the in-scope objects still carrying an old tag.
//!
//! ## Components
//!
//! - **Tag codec** ([`tag`]): reads and writes tags and scopes across the
//!   annotation-only and annotation+label migration phases
//! - **Ownership** ([`ownership`]): controller owner-reference checks
//! - **Eligibility** ([`eligibility`]): the deletion predicate and sweep verdicts
//! - **Reconciler** ([`reconciler`]): the apply-then-sweep cycle
//!
//! ## Object opt-outs
//!
//! | Condition | Effect |
//! |-----------|--------|
//! | `kubesweep.io/gc-strategy: ignore` | never deleted |
//! | controller owner reference | left to its controller |
//! | no GC tag | never deleted |
//!
//! ## Example
//!
//! ```rust
//! use kubesweep_core::ManagedObject;
//! use kubesweep_gc::prelude::*;
//!
//! let mut object = ManagedObject::new("v1", "ConfigMap", Some("default"), "settings");
//! write_tag(&mut object, "build-41", MigrationPhase::AnnotationAndLabel);
//!
//! assert_eq!(read_tag(&object), Some("build-41"));
//! assert!(eligible_for_gc(&object, "build-41"));
//! assert_eq!(sweep_verdict(&object, "build-42"), SweepVerdict::Delete);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod eligibility;
pub mod error;
pub mod keys;
pub mod metrics;
pub mod ownership;
pub mod reconciler;
pub mod retry;
pub mod tag;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{ReconcilerConfig, RunOptions};
    pub use crate::eligibility::{
        Eligibility, SkipReason, SweepVerdict, eligible_for_gc, evaluate, sweep_verdict,
    };
    pub use crate::error::{GcError, Result};
    pub use crate::ownership::{controller_owner, is_controller_owned};
    pub use crate::reconciler::{
        Reconciler, RunError, RunErrorKind, RunPhase, RunResult, SkippedObject, reconcile,
    };
    pub use crate::retry::RetryPolicy;
    pub use crate::tag::{
        DeploymentScope, GcStrategy, GcTag, MigrationPhase, read_scope, read_strategy, read_tag,
        write_scope, write_tag,
    };
}

pub use config::{ReconcilerConfig, RunOptions};
pub use eligibility::{Eligibility, SkipReason, SweepVerdict, eligible_for_gc, sweep_verdict};
pub use error::{GcError, Result};
pub use reconciler::{Reconciler, RunError, RunErrorKind, RunPhase, RunResult, reconcile};
pub use retry::RetryPolicy;
pub use tag::{DeploymentScope, GcStrategy, GcTag, MigrationPhase};
