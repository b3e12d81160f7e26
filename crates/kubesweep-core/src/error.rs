//! Error types and result aliases for kubesweep.
//!
//! These are the errors a [`ClusterAccessor`](crate::accessor::ClusterAccessor)
//! surfaces. They are structured so the reconciler can tell retryable
//! conditions apart from terminal ones without string matching.

/// The result type used throughout kubesweep.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the cluster store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The cluster store was unreachable or failed with a server-side error.
    ///
    /// Callers may retry these with backoff.
    #[error("transient cluster error: {message}")]
    Transient {
        /// Description of the failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The cluster store rejected the request (validation, authorization, ...).
    #[error("request rejected: {message}")]
    Rejected {
        /// Description of the rejection.
        message: String,
    },

    /// An optimistic-concurrency precondition failed on write.
    #[error("conflict on {resource}: {message}")]
    Conflict {
        /// The object that was being written.
        resource: String,
        /// Description of the conflict.
        message: String,
    },

    /// The addressed object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a transient error with the given message.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a transient error with a source cause.
    #[must_use]
    pub fn transient_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transient {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a conflict error for the given resource.
    #[must_use]
    pub fn conflict(resource: impl std::fmt::Display, message: impl Into<String>) -> Self {
        Self::Conflict {
            resource: resource.to_string(),
            message: message.into(),
        }
    }

    /// Returns true if retrying the same call may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Returns true for optimistic-concurrency rejections.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns true if the addressed object does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
