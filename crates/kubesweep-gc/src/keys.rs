//! Metadata keys and values that form the on-object wire contract.
//!
//! These strings are persisted on live objects and read back by later runs,
//! possibly by other kubesweep versions. They must never change.

/// Annotation holding the GC tag (present on every tagged object).
pub const ANNOTATION_GC_TAG: &str = "kubesweep.io/gc-tag";

/// Label holding the GC tag (present once the object was written in label mode).
pub const LABEL_GC_TAG: &str = "kubesweep.io/gc-tag";

/// Annotation holding the deployment scope.
pub const ANNOTATION_GC_SCOPE: &str = "kubesweep.io/gc-scope";

/// Label holding the deployment scope; used as the server-side list selector.
pub const LABEL_GC_SCOPE: &str = "kubesweep.io/gc-scope";

/// Annotation holding the per-object GC strategy.
pub const ANNOTATION_GC_STRATEGY: &str = "kubesweep.io/gc-strategy";

/// Strategy value: the object takes part in GC (also the default when absent).
pub const GC_STRATEGY_AUTO: &str = "auto";

/// Strategy value: the object is never deleted by GC.
pub const GC_STRATEGY_IGNORE: &str = "ignore";
