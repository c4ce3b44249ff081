//! The blocking retry loop.

use std::fmt;
use std::time::Instant;

use super::error::RetryExhausted;
use super::options::{ExecutionConfig, RetryOption};
use super::policy::Policy;

/// Run `operation` until it succeeds or `policy` declines another attempt.
///
/// The operation always runs at least once. After each failure the policy is
/// asked whether to retry; delaying policies block inside that call. When the
/// policy says stop, the last error is returned wrapped in
/// [`RetryExhausted`].
///
/// # Examples
///
/// ```rust
/// use persevere::{retry, Simple};
///
/// let mut attempts = 0;
/// let result = retry(Simple::new(3), || {
///     attempts += 1;
///     if attempts < 3 { Err("not yet") } else { Ok(attempts) }
/// });
///
/// assert_eq!(result, Ok(3));
/// ```
pub fn retry<T, E, P, F>(policy: P, operation: F) -> Result<T, RetryExhausted<E>>
where
    P: Policy<E>,
    F: FnMut() -> Result<T, E>,
{
    run_blocking(policy, operation, ExecutionConfig::default())
}

/// [`retry`] with options such as [`on_error`](crate::on_error).
pub fn retry_with<'a, T, E, P, F, I>(
    policy: P,
    operation: F,
    options: I,
) -> Result<T, RetryExhausted<E>>
where
    P: Policy<E>,
    F: FnMut() -> Result<T, E>,
    I: IntoIterator<Item = RetryOption<'a, E>>,
{
    run_blocking(policy, operation, ExecutionConfig::from_options(options))
}

fn run_blocking<T, E, P, F>(
    mut policy: P,
    mut operation: F,
    mut config: ExecutionConfig<'_, E>,
) -> Result<T, RetryExhausted<E>>
where
    P: Policy<E>,
    F: FnMut() -> Result<T, E>,
{
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts = attempts.saturating_add(1);
        let error = match operation() {
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

        if !policy.should_retry(&error) {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                label = config.label(),
                attempts,
                elapsed = ?start.elapsed(),
                "retries exhausted"
            );
            return Err(RetryExhausted::new(error, attempts, start.elapsed()));
        }
    }
}

/// Builder for a blocking retry run.
///
/// Prefer [`retry`] when the policy and operation are at hand. The builder
/// suits call sites that assemble a run piecemeal; forgetting a piece is a
/// programming error and [`run`](Retry::run) panics before doing anything.
///
/// # Examples
///
/// ```rust
/// use persevere::testing::Flaky;
/// use persevere::{Fixed, Retry};
/// use std::time::Duration;
///
/// let mut op = Flaky::new(2, "timeout", "pong");
/// let mut failures = 0;
///
/// let result = Retry::new()
///     .policy(Fixed::new(5, Duration::from_millis(1)))
///     .on_error(|_: &&str| failures += 1)
///     .named("ping")
///     .operation(|| op.call())
///     .run();
///
/// assert_eq!(result, Ok("pong"));
/// assert_eq!(failures, 2);
/// ```
pub struct Retry<'a, P, F, E> {
    policy: Option<P>,
    operation: Option<F>,
    config: ExecutionConfig<'a, E>,
}

impl<'a, P, F, E> Retry<'a, P, F, E> {
    /// Start an empty builder.
    pub fn new() -> Self {
        Self {
            policy: None,
            operation: None,
            config: ExecutionConfig::default(),
        }
    }

    /// Set the policy.
    pub fn policy(mut self, policy: P) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Set the operation.
    pub fn operation(mut self, operation: F) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Apply an option. Options take effect in the order they are added.
    pub fn option(mut self, option: RetryOption<'a, E>) -> Self {
        option.apply(&mut self.config);
        self
    }

    /// Shorthand for `.option(on_error(hook))`.
    pub fn on_error<H>(self, hook: H) -> Self
    where
        H: FnMut(&E) + 'a,
        E: 'a,
    {
        self.option(super::options::on_error(hook))
    }

    /// Shorthand for `.option(named(label))`.
    pub fn named(self, label: impl Into<String>) -> Self
    where
        E: 'a,
    {
        self.option(super::options::named(label.into()))
    }

    /// Run the configured operation.
    ///
    /// # Panics
    ///
    /// Panics if the policy or the operation was never set.
    pub fn run<T>(self) -> Result<T, RetryExhausted<E>>
    where
        P: Policy<E>,
        F: FnMut() -> Result<T, E>,
    {
        let Some(policy) = self.policy else {
            panic!("illegal use of api: cannot operate without a retry policy");
        };
        let Some(operation) = self.operation else {
            panic!("illegal use of api: cannot retry without an operation");
        };
        run_blocking(policy, operation, self.config)
    }
}

impl<P, F, E> Default for Retry<'_, P, F, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: fmt::Debug, F, E> fmt::Debug for Retry<'_, P, F, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retry")
            .field("policy", &self.policy)
            .field("operation", &self.operation.as_ref().map(|_| "<operation>"))
            .field("config", &self.config)
            .finish()
    }
}
