//! Bounded retry with exponential backoff for transient cluster failures.
//!
//! Only [`Error::Transient`](kubesweep_core::Error::Transient) is retried
//! here. Conflicts need a re-fetch and are handled by the reconciler's apply
//! path; everything else fails on the first attempt.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use kubesweep_core::Error;

/// Retry bounds for cluster calls.
///
/// # Example
///
/// ```rust
/// use kubesweep_gc::retry::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.backoff(1), Duration::from_millis(100));
/// assert_eq!(policy.backoff(2), Duration::from_millis(200));
/// assert_eq!(policy.backoff(30), Duration::from_millis(5_000));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total attempts for a transient failure, including the first.
    pub max_attempts: u32,

    /// Re-fetch-and-reapply rounds after an apply conflict.
    pub max_conflict_retries: u32,

    /// Delay before the first retry, doubled on each further retry.
    pub base_backoff_ms: u64,

    /// Upper bound for any single delay.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            max_conflict_retries: 3,
            base_backoff_ms: 100,
            max_backoff_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            max_conflict_retries: 0,
            base_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Returns the delay after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let ms = self
            .base_backoff_ms
            .saturating_mul(2_u64.saturating_pow(exponent))
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

/// Failure of a retried call.
#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    /// The call failed terminally or ran out of attempts.
    #[error("{source} (after {attempts} attempt(s))")]
    Failed {
        /// Attempts made.
        attempts: u32,
        /// The last error.
        #[source]
        source: Error,
    },

    /// Cancellation was observed before the call could succeed.
    #[error("cancelled")]
    Cancelled,
}

impl RetryError {
    /// Returns the underlying cluster error, if any.
    #[must_use]
    pub const fn cluster_error(&self) -> Option<&Error> {
        match self {
            Self::Failed { source, .. } => Some(source),
            Self::Cancelled => None,
        }
    }
}

/// Sleeps for `delay` unless `cancel` fires first.
///
/// Returns false if cancelled.
pub async fn sleep_unless_cancelled(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

/// Runs `call`, retrying transient failures per `policy`.
///
/// `operation` labels the retry metric and log events.
///
/// # Errors
///
/// Returns [`RetryError::Failed`] with the last error once attempts are
/// exhausted or a non-transient error occurs, and [`RetryError::Cancelled`]
/// if `cancel` fires before a retry is issued. The first attempt is always
/// made; callers check cancellation before starting an operation.
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    operation: &'static str,
    mut call: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = kubesweep_core::Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        if attempt > 0 && cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }
        attempt += 1;
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = policy.backoff(attempt);
                tracing::debug!(
                    operation,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "retrying transient cluster error"
                );
                crate::metrics::record_retry(operation);
                if !sleep_unless_cancelled(delay, cancel).await {
                    return Err(RetryError::Cancelled);
                }
            }
            Err(source) => {
                return Err(RetryError::Failed {
                    attempts: attempt,
                    source,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy {
            base_backoff_ms: 1,
            max_backoff_ms: 2,
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(10), Duration::from_millis(5_000));
        assert_eq!(policy.backoff(u32::MAX), Duration::from_millis(5_000));
        assert_eq!(RetryPolicy::none().backoff(4), Duration::ZERO);
    }

    #[tokio::test]
    async fn transient_errors_are_retried_until_success() {
        let calls = &AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let value = retry_transient(&fast(), &cancel, "test", || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Error::transient("503"))
            } else {
                Ok(7)
            }
        })
        .await
        .expect("third attempt succeeds");

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn attempts_are_bounded() {
        let calls = &AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let err = retry_transient(&fast(), &cancel, "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(Error::transient("503"))
        })
        .await
        .expect_err("never succeeds");

        assert!(matches!(err, RetryError::Failed { attempts: 5, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn terminal_errors_fail_fast() {
        let calls = &AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let err = retry_transient(&fast(), &cancel, "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(Error::Rejected {
                message: "forbidden".into(),
            })
        })
        .await
        .expect_err("rejected");

        assert!(matches!(err, RetryError::Failed { attempts: 1, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_interrupts_backoff() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let slow = RetryPolicy {
            base_backoff_ms: 60_000,
            max_backoff_ms: 60_000,
            ..RetryPolicy::default()
        };

        let err = retry_transient(&slow, &cancel, "test", || async {
            Err::<(), _>(Error::transient("503"))
        })
        .await
        .expect_err("cancelled");

        assert!(matches!(err, RetryError::Cancelled));
    }

    #[tokio::test]
    async fn no_retry_is_issued_after_cancellation() {
        let calls = &AtomicU32::new(0);
        let cancel = &CancellationToken::new();

        // Zero backoff: the sleep completes immediately, so only the
        // pre-attempt check can stop the second call.
        let policy = RetryPolicy {
            base_backoff_ms: 0,
            max_backoff_ms: 0,
            ..RetryPolicy::default()
        };
        let err = retry_transient(&policy, cancel, "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            cancel.cancel();
            Err::<(), _>(Error::transient("503"))
        })
        .await
        .expect_err("cancelled");

        assert!(matches!(err, RetryError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
