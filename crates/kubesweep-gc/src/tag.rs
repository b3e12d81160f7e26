//! GC tag codec.
//!
//! Tags and scopes live in two places on an object: an annotation, which every
//! kubesweep version writes, and a label, which is only written once the
//! migration phase enables it. Labels can be queried server-side, so when both
//! are present the label wins.
//!
//! ```text
//! effective(object) = label  if present
//!                   | annotation  if present
//!                   | absent
//! ```
//!
//! Every function here is total: missing or malformed metadata degrades to
//! "absent" or [`GcStrategy::Auto`].

use std::fmt;

use serde::{Deserialize, Serialize};

use kubesweep_core::Metadata;

use crate::error::{GcError, Result};
use crate::keys::{
    ANNOTATION_GC_SCOPE, ANNOTATION_GC_STRATEGY, ANNOTATION_GC_TAG, GC_STRATEGY_AUTO,
    GC_STRATEGY_IGNORE, LABEL_GC_SCOPE, LABEL_GC_TAG,
};

/// Maximum length of a Kubernetes label value.
pub const MAX_LABEL_VALUE_LEN: usize = 63;

/// Process-wide choice of where tags are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MigrationPhase {
    /// Phase 1: annotation only, readable by every older version.
    #[default]
    AnnotationOnly,
    /// Phase 2: annotation and label, enabling label-selector listing.
    ///
    /// Runs in this phase list by scope label, so objects last written in
    /// phase 1 (annotation only) are invisible to the sweep until a phase-2
    /// run re-applies them. Dropping such an object from the desired set
    /// before then leaves it behind.
    AnnotationAndLabel,
}

impl MigrationPhase {
    /// Returns true if writes in this phase set the label as well.
    #[must_use]
    pub const fn emits_labels(self) -> bool {
        matches!(self, Self::AnnotationAndLabel)
    }

    /// Returns true if sweeps in this phase list by scope label, which
    /// misses objects that carry the scope only as an annotation.
    #[must_use]
    pub const fn lists_by_label(self) -> bool {
        self.emits_labels()
    }
}

impl fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnnotationOnly => f.write_str("annotation-only"),
            Self::AnnotationAndLabel => f.write_str("annotation-and-label"),
        }
    }
}

/// Per-object GC opt-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GcStrategy {
    /// Object takes part in GC.
    #[default]
    Auto,
    /// Object is never deleted by GC.
    Ignore,
}

impl GcStrategy {
    /// Returns the annotation value for this strategy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => GC_STRATEGY_AUTO,
            Self::Ignore => GC_STRATEGY_IGNORE,
        }
    }
}

/// An annotation key and label key that store the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DualKey {
    /// Annotation key (always written).
    pub annotation: &'static str,
    /// Label key (written when the phase emits labels).
    pub label: &'static str,
}

/// Keys for the GC tag.
pub const TAG_KEYS: DualKey = DualKey {
    annotation: ANNOTATION_GC_TAG,
    label: LABEL_GC_TAG,
};

/// Keys for the deployment scope.
pub const SCOPE_KEYS: DualKey = DualKey {
    annotation: ANNOTATION_GC_SCOPE,
    label: LABEL_GC_SCOPE,
};

impl DualKey {
    /// Returns the effective value: label if present, else annotation.
    #[must_use]
    pub fn read<'a, M: Metadata + ?Sized>(&self, object: &'a M) -> Option<&'a str> {
        object
            .label(self.label)
            .or_else(|| object.annotation(self.annotation))
    }

    /// Writes `value`, adding the label only when `phase` emits labels.
    ///
    /// Only `object` is touched. A stale label left by an earlier phase-2
    /// write is overwritten in phase 2 and removed in phase 1, so the label
    /// never outranks a newer annotation.
    pub fn write<M: Metadata + ?Sized>(&self, object: &mut M, value: &str, phase: MigrationPhase) {
        object.set_annotation(self.annotation, value);
        if phase.emits_labels() {
            object.set_label(self.label, value);
        } else if object.label(self.label).is_some_and(|v| v != value) {
            object.remove_label(self.label);
        }
    }
}

/// Returns the effective GC tag of `object`.
#[must_use]
pub fn read_tag<M: Metadata + ?Sized>(object: &M) -> Option<&str> {
    TAG_KEYS.read(object)
}

/// Stamps `object` with `tag` according to `phase`.
pub fn write_tag<M: Metadata + ?Sized>(object: &mut M, tag: &str, phase: MigrationPhase) {
    TAG_KEYS.write(object, tag, phase);
}

/// Returns the effective deployment scope of `object`.
#[must_use]
pub fn read_scope<M: Metadata + ?Sized>(object: &M) -> Option<&str> {
    SCOPE_KEYS.read(object)
}

/// Stamps `object` with `scope` according to `phase`.
pub fn write_scope<M: Metadata + ?Sized>(object: &mut M, scope: &str, phase: MigrationPhase) {
    SCOPE_KEYS.write(object, scope, phase);
}

/// Returns the GC strategy of `object`.
///
/// Only the exact value `ignore` opts out; anything else is `auto`.
#[must_use]
pub fn read_strategy<M: Metadata + ?Sized>(object: &M) -> GcStrategy {
    match object.annotation(ANNOTATION_GC_STRATEGY) {
        Some(GC_STRATEGY_IGNORE) => GcStrategy::Ignore,
        _ => GcStrategy::Auto,
    }
}

/// Returns true if `value` is a valid Kubernetes label value.
///
/// At most 63 characters, `[A-Za-z0-9]` at both ends, `-`, `_` and `.`
/// allowed in between. The empty string is valid.
#[must_use]
pub fn is_valid_label_value(value: &str) -> bool {
    if value.is_empty() {
        return true;
    }
    if value.len() > MAX_LABEL_VALUE_LEN {
        return false;
    }
    let bytes = value.as_bytes();
    let edge_ok = |b: u8| b.is_ascii_alphanumeric();
    if !edge_ok(bytes[0]) || !edge_ok(bytes[bytes.len() - 1]) {
        return false;
    }
    bytes
        .iter()
        .all(|&b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

macro_rules! tag_newtype {
    ($(#[$doc:meta])* $name:ident, $what:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a value after checking it is non-empty.
            ///
            /// # Errors
            ///
            /// Returns an error if the value is empty.
            pub fn new(value: impl Into<String>) -> Result<Self> {
                let value = value.into();
                if value.is_empty() {
                    return Err(GcError::InvalidTag {
                        message: concat!($what, " cannot be empty").to_string(),
                    });
                }
                Ok(Self(value))
            }

            /// Checks that the value can be written as a label in `phase`.
            ///
            /// # Errors
            ///
            /// Returns an error if `phase` emits labels and the value is not a
            /// valid label value.
            pub fn ensure_writable(&self, phase: MigrationPhase) -> Result<()> {
                if phase.emits_labels() && !is_valid_label_value(&self.0) {
                    return Err(GcError::InvalidTag {
                        message: format!(
                            concat!($what, " '{}' is not a valid label value (required in {} phase)"),
                            self.0, phase
                        ),
                    });
                }
                Ok(())
            }

            /// Returns the value as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

tag_newtype!(
    /// Caller-supplied identity of one desired-state generation.
    ///
    /// Must differ from the tag of the previous run against the same scope.
    GcTag,
    "gc tag"
);

tag_newtype!(
    /// Stable identity of the logical deployment target across runs.
    DeploymentScope,
    "deployment scope"
);
