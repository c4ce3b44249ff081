//! Testing utilities for code that retries.
//!
//! - [`RecordingSleep`] stands in for [`ThreadSleep`](crate::ThreadSleep) and
//!   records requested delays instead of blocking.
//! - [`Flaky`] is an operation that fails a set number of times before
//!   succeeding, counting every invocation.
//! - [`assert_exhausted!`](crate::assert_exhausted) checks a retry result.
//!
//! # Examples
//!
//! ```rust
//! use persevere::testing::{Flaky, RecordingSleep};
//! use persevere::{assert_exhausted, retry, Fixed};
//! use std::time::Duration;
//!
//! let sleeper = RecordingSleep::new();
//! let policy = Fixed::new(3, Duration::from_secs(30)).with_sleeper(sleeper.clone());
//! let mut op = Flaky::always_failing("boom");
//!
//! let result = retry(policy, || op.call());
//!
//! assert_exhausted!(result, 3);
//! assert_eq!(op.calls(), 3);
//! assert_eq!(sleeper.total(), Duration::from_secs(60));
//! ```

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::retry::Sleep;

/// A [`Sleep`] that records delays and returns immediately.
///
/// Clones share the same record, so keep a clone after handing one to a
/// policy.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleep {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleep {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delay requested so far, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.lock().clone()
    }

    /// Sum of all requested delays.
    pub fn total(&self) -> Duration {
        self.lock().iter().sum()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Duration>> {
        self.delays
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Sleep for RecordingSleep {
    fn sleep(&self, duration: Duration) {
        self.lock().push(duration);
    }
}

/// An operation that fails `failures` times, then succeeds with `value`.
#[derive(Debug, Clone)]
pub struct Flaky<T, E> {
    failures: u32,
    calls: u32,
    value: Option<T>,
    error: E,
}

impl<T: Clone, E: Clone> Flaky<T, E> {
    /// Fail `failures` times with `error`, then return `value` on every call.
    pub fn new(failures: u32, error: E, value: T) -> Self {
        Self {
            failures,
            calls: 0,
            value: Some(value),
            error,
        }
    }

    /// Invoke the operation.
    pub fn call(&mut self) -> Result<T, E> {
        self.calls += 1;
        match &self.value {
            Some(value) if self.calls > self.failures => Ok(value.clone()),
            _ => Err(self.error.clone()),
        }
    }

    /// Number of times [`call`](Flaky::call) ran.
    pub fn calls(&self) -> u32 {
        self.calls
    }
}

impl<E: Clone> Flaky<(), E> {
    /// An operation that never succeeds.
    pub fn always_failing(error: E) -> Self {
        Self {
            failures: u32::MAX,
            calls: 0,
            value: None,
            error,
        }
    }
}

/// Assert that a retry result is a [`RetryExhausted`](crate::RetryExhausted)
/// error, optionally after a given number of attempts.
///
/// Evaluates to the exhausted error.
///
/// # Example
///
/// ```rust
/// use persevere::{assert_exhausted, retry, Simple};
///
/// let result = retry(Simple::new(2), || Err::<(), _>("down"));
/// let exhausted = assert_exhausted!(result, 2);
/// assert_eq!(exhausted.final_error, "down");
/// ```
#[macro_export]
macro_rules! assert_exhausted {
    ($result:expr) => {
        match $result {
            ::core::result::Result::Err(exhausted) => {
                let exhausted: $crate::RetryExhausted<_> = exhausted;
                exhausted
            }
            ::core::result::Result::Ok(v) => {
                panic!("Expected RetryExhausted, got Ok: {:?}", v);
            }
        }
    };
    ($result:expr, $attempts:expr) => {{
        let exhausted = $crate::assert_exhausted!($result);
        assert_eq!(
            exhausted.attempts, $attempts,
            "unexpected number of attempts before exhaustion"
        );
        exhausted
    }};
}
