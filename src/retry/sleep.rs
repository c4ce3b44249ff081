//! Pluggable blocking suspension used by delaying policies.

use std::sync::Arc;
use std::time::Duration;

/// Suspends the calling thread between attempts.
///
/// The default [`ThreadSleep`] parks the thread with [`std::thread::sleep`].
/// Tests swap in [`crate::testing::RecordingSleep`] to observe the delays a
/// policy asks for without waiting on them.
pub trait Sleep {
    /// Block the caller for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Sleeps on the current thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadSleep;

impl Sleep for ThreadSleep {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

impl<S: Sleep + ?Sized> Sleep for &S {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

impl<S: Sleep + ?Sized> Sleep for Arc<S> {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}
