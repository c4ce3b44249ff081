//! The async retry loop, on tokio.
//!
//! Same contract as the blocking executor, but the wait between attempts is a
//! `tokio::time::sleep` rather than a parked thread. The wait is cancellable
//! twice over: dropping the returned future abandons it, and a
//! [`CancellationToken`](tokio_util::sync::CancellationToken) attached with
//! [`with_cancellation`](crate::with_cancellation) ends the run promptly with
//! [`StopReason::Cancelled`](crate::StopReason::Cancelled).

use std::future::Future;
use std::time::{Duration, Instant};

use futures::future::{self, BoxFuture, FutureExt};
use rand::RngCore;

use super::cancel::Cancellation;
use super::error::RetryExhausted;
use super::options::{ExecutionConfig, RetryOption, SendErrorHook};
use super::policy::{ExponentialBackoff, Fixed, FnPolicy, RetryIf, Simple};

/// A policy whose wait between attempts is asynchronous.
///
/// The built-in policies implement it with a tokio timer. Their configured
/// [`Sleep`](crate::Sleep) is only used by the blocking executor.
pub trait AsyncPolicy<E> {
    /// Decide whether to retry after `error`, waiting out any delay first.
    fn should_retry<'a>(&'a mut self, error: &'a E) -> BoxFuture<'a, bool>;
}

impl<E, P: AsyncPolicy<E> + ?Sized> AsyncPolicy<E> for &mut P {
    fn should_retry<'a>(&'a mut self, error: &'a E) -> BoxFuture<'a, bool> {
        (**self).should_retry(error)
    }
}

impl<E, P: AsyncPolicy<E> + ?Sized> AsyncPolicy<E> for Box<P> {
    fn should_retry<'a>(&'a mut self, error: &'a E) -> BoxFuture<'a, bool> {
        (**self).should_retry(error)
    }
}

/// Wait out `delay`, if any, then report whether to retry.
fn wait(delay: Option<Duration>) -> BoxFuture<'static, bool> {
    match delay {
        Some(d) if !d.is_zero() => tokio::time::sleep(d).map(|()| true).boxed(),
        Some(_) => future::ready(true).boxed(),
        None => future::ready(false).boxed(),
    }
}

impl<E: Cancellation> AsyncPolicy<E> for Simple {
    fn should_retry<'a>(&'a mut self, error: &'a E) -> BoxFuture<'a, bool> {
        wait(self.next_delay(error))
    }
}

impl<E: Cancellation, S> AsyncPolicy<E> for Fixed<S> {
    fn should_retry<'a>(&'a mut self, error: &'a E) -> BoxFuture<'a, bool> {
        wait(self.next_delay(error))
    }
}

impl<E, R, S> AsyncPolicy<E> for ExponentialBackoff<R, S>
where
    E: Cancellation,
    R: RngCore,
{
    fn should_retry<'a>(&'a mut self, error: &'a E) -> BoxFuture<'a, bool> {
        wait(self.next_delay(error))
    }
}

impl<E, F> AsyncPolicy<E> for FnPolicy<F>
where
    FnPolicy<F>: super::policy::Policy<E>,
{
    fn should_retry<'a>(&'a mut self, error: &'a E) -> BoxFuture<'a, bool> {
        let decision = super::policy::Policy::should_retry(self, error);
        future::ready(decision).boxed()
    }
}

impl<E, P, F> AsyncPolicy<E> for RetryIf<P, F>
where
    P: AsyncPolicy<E>,
    F: FnMut(&E) -> bool,
{
    fn should_retry<'a>(&'a mut self, error: &'a E) -> BoxFuture<'a, bool> {
        let (inner, predicate) = self.parts();
        if predicate(error) {
            inner.should_retry(error)
        } else {
            future::ready(false).boxed()
        }
    }
}

/// Async counterpart of [`retry`](crate::retry).
///
/// `operation` is called afresh for every attempt and its future awaited.
///
/// # Examples
///
/// ```rust
/// use persevere::{retry_async, Fixed};
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let counter = AtomicU32::new(0);
/// let attempts = &counter;
/// let result = retry_async(Fixed::new(3, Duration::from_millis(1)), || async move {
///     let n = attempts.fetch_add(1, Ordering::SeqCst);
///     if n < 2 { Err("transient failure") } else { Ok("success") }
/// })
/// .await;
///
/// assert_eq!(result, Ok("success"));
/// assert_eq!(attempts.load(Ordering::SeqCst), 3);
/// # });
/// ```
pub fn retry_async<'a, T, E, P, F, Fut>(
    policy: P,
    operation: F,
) -> impl Future<Output = Result<T, RetryExhausted<E>>> + 'a
where
    T: 'a,
    E: 'a,
    P: AsyncPolicy<E> + 'a,
    F: FnMut() -> Fut + 'a,
    Fut: Future<Output = Result<T, E>> + 'a,
{
    run_async(policy, operation, ExecutionConfig::default())
}

/// [`retry_async`] with options such as [`on_error`](crate::on_error) and
/// [`with_cancellation`](crate::with_cancellation).
///
/// Options are applied before this function returns, so the future does not
/// hold on to them. An error hook must be `Send`, so that the future is too.
pub fn retry_async_with<'a, T, E, P, F, Fut, I>(
    policy: P,
    operation: F,
    options: I,
) -> impl Future<Output = Result<T, RetryExhausted<E>>> + 'a
where
    T: 'a,
    E: 'a,
    P: AsyncPolicy<E> + 'a,
    F: FnMut() -> Fut + 'a,
    Fut: Future<Output = Result<T, E>> + 'a,
    I: IntoIterator<Item = RetryOption<'a, E, SendErrorHook<'a, E>>>,
{
    run_async(policy, operation, ExecutionConfig::from_options(options))
}

async fn run_async<T, E, P, F, Fut>(
    mut policy: P,
    mut operation: F,
    mut config: ExecutionConfig<'_, E, SendErrorHook<'_, E>>,
) -> Result<T, RetryExhausted<E>>
where
    P: AsyncPolicy<E>,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts = attempts.saturating_add(1);
        let error = match operation().await {
            Ok(value) => {
                #[cfg(feature = "tracing")]
                if attempts > 1 {
                    tracing::debug!(label = config.label(), attempts, "operation recovered");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(label = config.label(), attempt = attempts, "attempt failed");

        config.notify(&error);

        let decision = match config.cancellation() {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => None,
                    keep_going = policy.should_retry(&error) => Some(keep_going),
                }
            }
            None => Some(policy.should_retry(&error).await),
        };

        match decision {
            Some(true) => continue,
            Some(false) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(label = config.label(), attempts, "retries exhausted");
                return Err(RetryExhausted::new(error, attempts, start.elapsed()));
            }
            None => {
                #[cfg(feature = "tracing")]
                tracing::debug!(label = config.label(), attempts, "retry cancelled while waiting");
                return Err(RetryExhausted::cancelled(error, attempts, start.elapsed()));
            }
        }
    }
}
