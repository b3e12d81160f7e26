//! Error types for kubesweep-gc operations.
//!
//! Only input and configuration problems are errors at this level. Cluster
//! failures during a run are collected into the
//! [`RunResult`](crate::reconciler::RunResult) instead.

use thiserror::Error;

/// Result type alias for GC operations.
pub type Result<T> = std::result::Result<T, GcError>;

/// Errors that reject a reconcile run before it starts.
#[derive(Debug, Error)]
pub enum GcError {
    /// A GC tag or deployment scope is malformed.
    #[error("invalid tag: {message}")]
    InvalidTag {
        /// Description of what made the value invalid.
        message: String,
    },

    /// The reconciler configuration failed validation.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the invalid setting.
        message: String,
    },

    /// A desired object cannot be applied as given.
    #[error("invalid object {object}: {message}")]
    InvalidObject {
        /// Kind and (possibly empty) name of the object.
        object: String,
        /// Why the object was rejected.
        message: String,
    },

    /// Two desired objects share one identity.
    #[error("duplicate object in desired set: {object}")]
    DuplicateObject {
        /// The repeated identity.
        object: String,
    },
}
