//! Error types for retry operations.

use std::time::Duration;

use super::cancel::Cancellation;

/// Why a retry run stopped without producing a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// The policy declined another attempt (budget spent, cancelled error,
    /// or an error the policy does not retry).
    PolicyDeclined,
    /// A cancellation signal fired while waiting between attempts.
    Cancelled,
}

/// Error returned when a retry run gives up.
///
/// Wraps the error from the final attempt together with metadata about the
/// run. It is a distinct type from the operation's own error, so callers can
/// tell "retries exhausted" apart from other failures without inspecting
/// messages.
///
/// # Examples
///
/// ```rust
/// use persevere::{retry, RetryExhausted, Simple};
///
/// let result: Result<(), RetryExhausted<&str>> = retry(Simple::new(3), || Err("boom"));
///
/// match result {
///     Err(exhausted) => {
///         assert_eq!(exhausted.final_error, "boom");
///         assert_eq!(exhausted.attempts, 3);
///     }
///     Ok(_) => panic!("Expected failure"),
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted<E> {
    /// The error from the final attempt.
    pub final_error: E,
    /// Total number of times the operation was invoked.
    pub attempts: u32,
    /// Total time spent, including delays.
    pub total_duration: Duration,
    /// What ended the run.
    pub reason: StopReason,
}

impl<E> RetryExhausted<E> {
    /// Create a new RetryExhausted error for a run the policy ended.
    pub fn new(final_error: E, attempts: u32, total_duration: Duration) -> Self {
        Self {
            final_error,
            attempts,
            total_duration,
            reason: StopReason::PolicyDeclined,
        }
    }

    /// Create a RetryExhausted error for a run interrupted by cancellation.
    pub fn cancelled(final_error: E, attempts: u32, total_duration: Duration) -> Self {
        Self {
            final_error,
            attempts,
            total_duration,
            reason: StopReason::Cancelled,
        }
    }

    /// Extract the final error, discarding metadata.
    pub fn into_error(self) -> E {
        self.final_error
    }

    /// Get a reference to the final error.
    pub fn error(&self) -> &E {
        &self.final_error
    }

    /// Transform the wrapped error, keeping the run metadata.
    pub fn map_err<F, E2>(self, f: F) -> RetryExhausted<E2>
    where
        F: FnOnce(E) -> E2,
    {
        RetryExhausted {
            final_error: f(self.final_error),
            attempts: self.attempts,
            total_duration: self.total_duration,
            reason: self.reason,
        }
    }
}

impl<E: std::fmt::Display> std::fmt::Display for RetryExhausted<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.reason {
            StopReason::PolicyDeclined => write!(
                f,
                "max retries exceeded after {} attempts ({:?}): {}",
                self.attempts, self.total_duration, self.final_error
            ),
            StopReason::Cancelled => write!(
                f,
                "retry cancelled after {} attempts ({:?}): {}",
                self.attempts, self.total_duration, self.final_error
            ),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryExhausted<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.final_error)
    }
}

// Nested runs: an inner run that gave up because of cancellation must stop
// the outer one too.
impl<E: Cancellation> Cancellation for RetryExhausted<E> {
    fn is_cancelled(&self) -> bool {
        self.reason == StopReason::Cancelled || self.final_error.is_cancelled()
    }
}
