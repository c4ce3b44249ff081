//! Retry policies: the decision of whether a failed attempt gets another try.
//!
//! A policy is consulted once per failed attempt with the error that attempt
//! produced. It answers `true` ("wait if needed, then retry") or `false`
//! ("stop and report exhaustion"). Delaying policies perform the wait
//! themselves before answering, so the executor never sleeps on its own.
//!
//! Policies carry per-run state (remaining attempts, current delay). Build a
//! fresh one for every run; the executors take them by value or `&mut`, so a
//! single instance cannot drive two runs at once.

use std::fmt;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use super::cancel::Cancellation;
use super::sleep::{Sleep, ThreadSleep};

/// Lower bound (inclusive) of the backoff jitter multiplier.
pub const JITTER_MIN: f64 = 0.25;
/// Upper bound (exclusive) of the backoff jitter multiplier.
pub const JITTER_MAX: f64 = 1.25;

/// Decides whether a failed attempt should be retried.
///
/// # Examples
///
/// ```rust
/// use persevere::{Policy, Simple};
///
/// let mut policy = Simple::new(3);
/// assert!(policy.should_retry(&"first failure"));
/// assert!(policy.should_retry(&"second failure"));
/// assert!(!policy.should_retry(&"third failure"));
/// ```
pub trait Policy<E> {
    /// Called with the error of each failed attempt.
    ///
    /// Returns `true` to retry. Any delay before the next attempt has already
    /// elapsed when this returns.
    fn should_retry(&mut self, error: &E) -> bool;
}

impl<E, P: Policy<E> + ?Sized> Policy<E> for &mut P {
    fn should_retry(&mut self, error: &E) -> bool {
        (**self).should_retry(error)
    }
}

impl<E, P: Policy<E> + ?Sized> Policy<E> for Box<P> {
    fn should_retry(&mut self, error: &E) -> bool {
        (**self).should_retry(error)
    }
}

/// A policy backed by a caller-supplied function.
///
/// Created by [`from_fn`].
#[derive(Clone)]
pub struct FnPolicy<F> {
    decide: F,
}

impl<F> fmt::Debug for FnPolicy<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPolicy").finish_non_exhaustive()
    }
}

impl<E, F> Policy<E> for FnPolicy<F>
where
    F: FnMut(&E) -> bool,
{
    fn should_retry(&mut self, error: &E) -> bool {
        (self.decide)(error)
    }
}

/// Turn any `FnMut(&E) -> bool` into a [`Policy`].
///
/// Useful for decisions that depend on the kind of error, like retrying
/// transient network failures but never validation failures.
///
/// # Examples
///
/// ```rust
/// use persevere::{from_fn, retry};
///
/// #[derive(Debug, PartialEq)]
/// enum ApiError {
///     Unavailable,
///     BadRequest,
/// }
///
/// let mut budget = 5;
/// let policy = from_fn(move |err: &ApiError| {
///     budget -= 1;
///     *err == ApiError::Unavailable && budget > 0
/// });
///
/// let mut calls = 0;
/// let result = retry(policy, || {
///     calls += 1;
///     Err::<(), _>(ApiError::BadRequest)
/// });
///
/// assert_eq!(calls, 1);
/// assert_eq!(result.unwrap_err().final_error, ApiError::BadRequest);
/// ```
pub fn from_fn<E, F>(decide: F) -> FnPolicy<F>
where
    F: FnMut(&E) -> bool,
{
    FnPolicy { decide }
}

/// Attempt counter shared by the built-in policies.
///
/// Saturates at zero so a zero budget never wraps into extra retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Budget {
    remaining: u32,
}

impl Budget {
    fn new(attempts: u32) -> Self {
        Self {
            remaining: attempts,
        }
    }

    fn consume(&mut self) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining > 0
    }
}

/// Retries up to a fixed number of attempts with no delay.
///
/// `Simple::new(n)` allows `n` invocations of the operation in total. A
/// budget of zero behaves like one: the operation runs once and is never
/// retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Simple {
    budget: Budget,
}

impl Simple {
    /// Create a policy allowing `attempts` invocations in total.
    pub fn new(attempts: u32) -> Self {
        Self {
            budget: Budget::new(attempts),
        }
    }

    /// Attempts still available to this run.
    pub fn remaining(&self) -> u32 {
        self.budget.remaining
    }

    /// Record a failure and return the delay before the next attempt, or
    /// `None` to stop. The delay is always zero.
    pub fn next_delay<E: Cancellation + ?Sized>(&mut self, error: &E) -> Option<Duration> {
        if error.is_cancelled() {
            return None;
        }
        self.budget.consume().then_some(Duration::ZERO)
    }
}

impl<E: Cancellation> Policy<E> for Simple {
    fn should_retry(&mut self, error: &E) -> bool {
        self.next_delay(error).is_some()
    }
}

/// Retries up to a fixed number of attempts, waiting the same delay each time.
///
/// # Examples
///
/// ```rust
/// use persevere::{Fixed, Policy};
/// use persevere::testing::RecordingSleep;
/// use std::time::Duration;
///
/// let sleeper = RecordingSleep::new();
/// let mut policy = Fixed::new(3, Duration::from_millis(250)).with_sleeper(sleeper.clone());
///
/// while policy.should_retry(&"unavailable") {}
///
/// assert_eq!(sleeper.delays(), vec![Duration::from_millis(250); 2]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixed<S = ThreadSleep> {
    budget: Budget,
    delay: Duration,
    sleeper: S,
}

impl Fixed {
    /// Create a policy allowing `attempts` invocations, `delay` apart.
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            budget: Budget::new(attempts),
            delay,
            sleeper: ThreadSleep,
        }
    }
}

impl<S> Fixed<S> {
    /// Use a different sleeper for the delays.
    pub fn with_sleeper<S2: Sleep>(self, sleeper: S2) -> Fixed<S2> {
        Fixed {
            budget: self.budget,
            delay: self.delay,
            sleeper,
        }
    }

    /// Attempts still available to this run.
    pub fn remaining(&self) -> u32 {
        self.budget.remaining
    }

    /// The delay applied between attempts.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Record a failure and return the delay before the next attempt, or
    /// `None` to stop. Does not sleep.
    pub fn next_delay<E: Cancellation + ?Sized>(&mut self, error: &E) -> Option<Duration> {
        if error.is_cancelled() {
            return None;
        }
        self.budget.consume().then_some(self.delay)
    }
}

impl<E: Cancellation, S: Sleep> Policy<E> for Fixed<S> {
    fn should_retry(&mut self, error: &E) -> bool {
        match self.next_delay(error) {
            Some(delay) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(?delay, remaining = self.budget.remaining, "fixed delay before retry");
                self.sleeper.sleep(delay);
                true
            }
            None => false,
        }
    }
}

/// Retries with a delay that roughly doubles after every attempt.
///
/// The first retry waits `initial_delay`. Each wait then updates the delay to
/// `2 × delay × jitter`, with `jitter` drawn uniformly from
/// [`JITTER_MIN`]`..`[`JITTER_MAX`]. The jitter spreads out callers that
/// failed together so they do not retry in lockstep.
///
/// Randomness comes from an injected [`RngCore`]; [`with_seed`] makes the
/// sequence reproducible.
///
/// [`with_seed`]: ExponentialBackoff::with_seed
///
/// # Examples
///
/// ```rust
/// use persevere::{ExponentialBackoff, Policy};
/// use persevere::testing::RecordingSleep;
/// use std::time::Duration;
///
/// let sleeper = RecordingSleep::new();
/// let mut policy = ExponentialBackoff::new(4, Duration::from_millis(100))
///     .with_seed(7)
///     .with_sleeper(sleeper.clone());
///
/// while policy.should_retry(&"timeout") {}
///
/// let delays = sleeper.delays();
/// assert_eq!(delays.len(), 3);
/// assert_eq!(delays[0], Duration::from_millis(100));
/// ```
pub struct ExponentialBackoff<R = StdRng, S = ThreadSleep> {
    budget: Budget,
    delay: Duration,
    rng: R,
    sleeper: S,
}

impl ExponentialBackoff {
    /// Create a policy allowing `attempts` invocations, starting at
    /// `initial_delay`. Jitter is seeded from the thread-local generator.
    pub fn new(attempts: u32, initial_delay: Duration) -> Self {
        Self {
            budget: Budget::new(attempts),
            delay: initial_delay,
            rng: StdRng::from_rng(&mut rand::rng()),
            sleeper: ThreadSleep,
        }
    }
}

impl<R, S> ExponentialBackoff<R, S> {
    /// Draw jitter from `rng` instead.
    pub fn with_rng<R2: RngCore>(self, rng: R2) -> ExponentialBackoff<R2, S> {
        ExponentialBackoff {
            budget: self.budget,
            delay: self.delay,
            rng,
            sleeper: self.sleeper,
        }
    }

    /// Draw jitter from a generator seeded with `seed`.
    pub fn with_seed(self, seed: u64) -> ExponentialBackoff<StdRng, S> {
        self.with_rng(StdRng::seed_from_u64(seed))
    }

    /// Use a different sleeper for the delays.
    pub fn with_sleeper<S2: Sleep>(self, sleeper: S2) -> ExponentialBackoff<R, S2> {
        ExponentialBackoff {
            budget: self.budget,
            delay: self.delay,
            rng: self.rng,
            sleeper,
        }
    }

    /// Attempts still available to this run.
    pub fn remaining(&self) -> u32 {
        self.budget.remaining
    }

    /// The delay the next retry will wait.
    pub fn current_delay(&self) -> Duration {
        self.delay
    }
}

impl<R: RngCore, S> ExponentialBackoff<R, S> {
    /// Record a failure and return the delay before the next attempt, or
    /// `None` to stop. Advances the running delay but does not sleep.
    pub fn next_delay<E: Cancellation + ?Sized>(&mut self, error: &E) -> Option<Duration> {
        if error.is_cancelled() || !self.budget.consume() {
            return None;
        }
        let delay = self.delay;
        self.delay = grow(delay, &mut self.rng);
        Some(delay)
    }
}

impl<R, S: fmt::Debug> fmt::Debug for ExponentialBackoff<R, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExponentialBackoff")
            .field("remaining", &self.budget.remaining)
            .field("delay", &self.delay)
            .field("sleeper", &self.sleeper)
            .finish_non_exhaustive()
    }
}

impl<E, R, S> Policy<E> for ExponentialBackoff<R, S>
where
    E: Cancellation,
    R: RngCore,
    S: Sleep,
{
    fn should_retry(&mut self, error: &E) -> bool {
        match self.next_delay(error) {
            Some(delay) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(
                    ?delay,
                    next_delay = ?self.delay,
                    remaining = self.budget.remaining,
                    "backing off before retry"
                );
                self.sleeper.sleep(delay);
                true
            }
            None => false,
        }
    }
}

/// Double `delay` and scale it by a jitter factor in `[JITTER_MIN, JITTER_MAX)`.
///
/// Saturates at `Duration::MAX` instead of overflowing.
fn grow<R: RngCore + ?Sized>(delay: Duration, rng: &mut R) -> Duration {
    let factor: f64 = rng.random_range(JITTER_MIN..JITTER_MAX);
    Duration::try_from_secs_f64(delay.as_secs_f64() * 2.0 * factor).unwrap_or(Duration::MAX)
}

/// Shorthand for [`Simple::new`].
pub fn simple(attempts: u32) -> Simple {
    Simple::new(attempts)
}

/// Shorthand for [`Fixed::new`].
pub fn fixed(attempts: u32, delay: Duration) -> Fixed {
    Fixed::new(attempts, delay)
}

/// Shorthand for [`ExponentialBackoff::new`].
pub fn exponential_backoff(attempts: u32, initial_delay: Duration) -> ExponentialBackoff {
    ExponentialBackoff::new(attempts, initial_delay)
}

/// A policy that only retries errors accepted by a predicate.
///
/// Created by [`PolicyExt::retry_if`]. Rejected errors stop the run at once
/// and leave the inner policy untouched, so no delay is spent on them.
#[derive(Clone)]
pub struct RetryIf<P, F> {
    inner: P,
    predicate: F,
}

impl<P: fmt::Debug, F> fmt::Debug for RetryIf<P, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryIf")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl<P, F> RetryIf<P, F> {
    /// Get the wrapped policy back.
    pub fn into_inner(self) -> P {
        self.inner
    }

    #[cfg(feature = "async")]
    pub(crate) fn parts(&mut self) -> (&mut P, &mut F) {
        (&mut self.inner, &mut self.predicate)
    }
}

impl<E, P, F> Policy<E> for RetryIf<P, F>
where
    P: Policy<E>,
    F: FnMut(&E) -> bool,
{
    fn should_retry(&mut self, error: &E) -> bool {
        (self.predicate)(error) && self.inner.should_retry(error)
    }
}

/// Combinators available on every [`Policy`].
pub trait PolicyExt<E>: Policy<E> + Sized {
    /// Retry only errors for which `predicate` returns true.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persevere::{retry, PolicyExt, Simple};
    ///
    /// let policy = Simple::new(5).retry_if(|err: &String| err.starts_with("transient"));
    ///
    /// let mut calls = 0;
    /// let result = retry(policy, || {
    ///     calls += 1;
    ///     Err::<(), _>("permanent: bad credentials".to_string())
    /// });
    ///
    /// assert!(result.is_err());
    /// assert_eq!(calls, 1);
    /// ```
    fn retry_if<F>(self, predicate: F) -> RetryIf<Self, F>
    where
        F: FnMut(&E) -> bool,
    {
        RetryIf {
            inner: self,
            predicate,
        }
    }
}

impl<E, P: Policy<E>> PolicyExt<E> for P {}

#[cfg(test)]
mod policy_tests {
    use super::*;
    use crate::retry::Cancelled;
    use crate::testing::RecordingSleep;

    #[test]
    fn test_simple_counts_down() {
        let mut policy = Simple::new(3);
        assert_eq!(policy.remaining(), 3);
        assert!(policy.should_retry(&"e"));
        assert!(policy.should_retry(&"e"));
        assert!(!policy.should_retry(&"e"));
        assert_eq!(policy.remaining(), 0);
    }

    #[test]
    fn test_zero_budget_never_retries() {
        let mut policy = Simple::new(0);
        assert!(!policy.should_retry(&"e"));
        // saturated, not wrapped
        assert!(!policy.should_retry(&"e"));
        assert_eq!(policy.remaining(), 0);
    }

    #[test]
    fn test_single_attempt_never_retries() {
        let mut policy = Simple::new(1);
        assert!(!policy.should_retry(&"e"));
    }

    #[test]
    fn test_cancellation_stops_every_builtin() {
        let sleeper = RecordingSleep::new();

        let mut simple = Simple::new(10);
        let mut fixed = Fixed::new(10, Duration::from_secs(1)).with_sleeper(sleeper.clone());
        let mut backoff = ExponentialBackoff::new(10, Duration::from_secs(1))
            .with_seed(1)
            .with_sleeper(sleeper.clone());

        assert!(!simple.should_retry(&Cancelled));
        assert!(!fixed.should_retry(&Cancelled));
        assert!(!backoff.should_retry(&Cancelled));
        assert!(sleeper.delays().is_empty());
    }

    #[test]
    fn test_cancellation_after_some_retries() {
        let mut policy = Simple::new(10);
        let io = |msg: &str| std::io::Error::other(msg.to_string());
        assert!(policy.should_retry(&io("refused")));
        assert!(!policy.should_retry(&std::io::Error::other(Cancelled)));
    }

    #[test]
    fn test_fixed_sleeps_between_attempts_only() {
        let sleeper = RecordingSleep::new();
        let mut policy = Fixed::new(4, Duration::from_millis(50)).with_sleeper(sleeper.clone());

        let mut calls = 1;
        while policy.should_retry(&"e") {
            calls += 1;
        }

        assert_eq!(calls, 4);
        // no sleep after the final, non-retried failure
        assert_eq!(sleeper.delays(), vec![Duration::from_millis(50); 3]);
    }

    #[test]
    fn test_fixed_zero_delay() {
        let mut policy = Fixed::new(2, Duration::ZERO);
        assert_eq!(policy.next_delay(&"e"), Some(Duration::ZERO));
        assert_eq!(policy.next_delay(&"e"), None);
    }

    #[test]
    fn test_backoff_first_delay_is_initial() {
        let mut policy = ExponentialBackoff::new(3, Duration::from_millis(100)).with_seed(42);
        assert_eq!(policy.next_delay(&"e"), Some(Duration::from_millis(100)));
        assert_ne!(policy.current_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_backoff_delays_stay_within_jitter_bounds() {
        let mut policy = ExponentialBackoff::new(20, Duration::from_millis(10)).with_seed(99);

        let mut prev = policy.next_delay(&"e").expect("first retry");
        while let Some(next) = policy.next_delay(&"e") {
            let ratio = next.as_secs_f64() / prev.as_secs_f64();
            assert!(
                (2.0 * JITTER_MIN - 1e-9..2.0 * JITTER_MAX + 1e-9).contains(&ratio),
                "ratio {} out of bounds",
                ratio
            );
            prev = next;
        }
    }

    #[test]
    fn test_backoff_grows_in_expectation() {
        let trials = 2_000;
        let mut sums = [0.0f64; 4];

        for seed in 0..trials {
            let mut policy = ExponentialBackoff::new(5, Duration::from_millis(100)).with_seed(seed);
            for slot in sums.iter_mut() {
                *slot += policy.next_delay(&"e").expect("within budget").as_secs_f64();
            }
        }

        // E[jitter] = 0.75, so each mean is about 1.5x the previous one.
        for pair in sums.windows(2) {
            let growth = pair[1] / pair[0];
            assert!(growth > 1.3 && growth < 1.7, "growth {}", growth);
        }
    }

    #[test]
    fn test_backoff_same_seed_same_delays() {
        let run = |seed| {
            let mut policy = ExponentialBackoff::new(6, Duration::from_millis(20)).with_seed(seed);
            std::iter::from_fn(|| policy.next_delay(&"e")).collect::<Vec<_>>()
        };
        assert_eq!(run(5), run(5));
        assert_eq!(run(5).len(), 5);
    }

    #[test]
    fn test_grow_does_not_overflow() {
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..100 {
            assert!(grow(Duration::MAX, &mut rng) >= Duration::MAX / 2);
        }
    }

    #[test]
    fn test_from_fn_policy() {
        let mut seen = Vec::new();
        let mut policy = from_fn(|err: &i32| {
            seen.push(*err);
            *err < 3
        });
        assert!(policy.should_retry(&1));
        assert!(!policy.should_retry(&3));
        drop(policy);
        assert_eq!(seen, vec![1, 3]);
    }

    #[test]
    fn test_retry_if_leaves_budget_untouched_on_reject() {
        let mut policy = Simple::new(3).retry_if(|err: &&str| *err != "fatal");
        assert!(!policy.should_retry(&"fatal"));
        assert!(policy.should_retry(&"flaky"));
        assert_eq!(policy.into_inner().remaining(), 2);
    }

    #[test]
    fn test_boxed_and_borrowed_policies() {
        let mut boxed: Box<dyn Policy<&str>> = Box::new(Simple::new(2));
        assert!(boxed.should_retry(&"e"));
        assert!(!boxed.should_retry(&"e"));

        let mut owned = Simple::new(2);
        {
            let mut borrowed = &mut owned;
            assert!(Policy::<&str>::should_retry(&mut borrowed, &"e"));
        }
        assert_eq!(owned.remaining(), 1);
    }

    #[test]
    fn test_shorthand_constructors() {
        assert_eq!(simple(4), Simple::new(4));
        assert_eq!(fixed(2, Duration::from_secs(1)).delay(), Duration::from_secs(1));
        assert_eq!(
            exponential_backoff(3, Duration::from_millis(5)).current_delay(),
            Duration::from_millis(5)
        );
    }

    #[test]
    fn test_debug_output() {
        let debug = format!("{:?}", ExponentialBackoff::new(3, Duration::from_millis(1)));
        assert!(debug.contains("ExponentialBackoff"));
        assert!(debug.contains("remaining: 3"));
    }
}
