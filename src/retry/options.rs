//! Per-run configuration applied through functional options.
//!
//! The blocking executors store the error hook as an [`ErrorHook`], which
//! runs on the caller's thread and may capture `Rc`s and `RefCell`s. The async
//! executor stores a [`SendErrorHook`] so its future stays `Send`. Option
//! constructors are generic over the two; the executor picks one.

use std::fmt;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Callback invoked with the error of every failed attempt.
pub type ErrorHook<'a, E> = Box<dyn FnMut(&E) + 'a>;

/// An [`ErrorHook`] that can cross threads, used by the async executor.
pub type SendErrorHook<'a, E> = Box<dyn FnMut(&E) + Send + 'a>;

/// Conversion of a closure into a boxed hook `H`.
///
/// Implemented for every `FnMut(&E)` as [`ErrorHook`], and for every
/// `FnMut(&E) + Send` as [`SendErrorHook`].
pub trait IntoErrorHook<'a, E, H> {
    /// Box the closure.
    fn into_hook(self) -> H;
}

impl<'a, E, F> IntoErrorHook<'a, E, ErrorHook<'a, E>> for F
where
    F: FnMut(&E) + 'a,
{
    fn into_hook(self) -> ErrorHook<'a, E> {
        Box::new(self)
    }
}

impl<'a, E, F> IntoErrorHook<'a, E, SendErrorHook<'a, E>> for F
where
    F: FnMut(&E) + Send + 'a,
{
    fn into_hook(self) -> SendErrorHook<'a, E> {
        Box::new(self)
    }
}

/// Settings for a single retry run.
///
/// Built by applying [`RetryOption`]s in order before the first attempt and
/// read-only once the run starts. `H` is the boxed hook type.
pub struct ExecutionConfig<'a, E, H = ErrorHook<'a, E>> {
    hook: Option<H>,
    label: Option<String>,
    #[cfg(feature = "async")]
    cancellation: Option<tokio_util::sync::CancellationToken>,
    _marker: PhantomData<(&'a (), fn(&E))>,
}

impl<'a, E, H> ExecutionConfig<'a, E, H> {
    /// Build a config from options, applied in the order given.
    pub fn from_options<I>(options: I) -> Self
    where
        I: IntoIterator<Item = RetryOption<'a, E, H>>,
    {
        let mut config = Self::default();
        for option in options {
            option.apply(&mut config);
        }
        config
    }

    /// Whether an error hook is attached.
    pub fn has_hook(&self) -> bool {
        self.hook.is_some()
    }

    /// The label attached with [`named`], if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    #[cfg(feature = "async")]
    pub(crate) fn cancellation(&self) -> Option<&tokio_util::sync::CancellationToken> {
        self.cancellation.as_ref()
    }

    /// Hand the error to the hook, if any.
    ///
    /// The hook is observational: a panic inside it is caught and logged so
    /// it cannot end the run.
    pub(crate) fn notify(&mut self, error: &E)
    where
        H: FnMut(&E),
    {
        if let Some(hook) = self.hook.as_mut() {
            if catch_unwind(AssertUnwindSafe(|| hook(error))).is_err() {
                #[cfg(feature = "tracing")]
                tracing::warn!(label = self.label.as_deref(), "error hook panicked; continuing");
            }
        }
    }
}

impl<E, H> Default for ExecutionConfig<'_, E, H> {
    fn default() -> Self {
        Self {
            hook: None,
            label: None,
            #[cfg(feature = "async")]
            cancellation: None,
            _marker: PhantomData,
        }
    }
}

impl<E, H> fmt::Debug for ExecutionConfig<'_, E, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ExecutionConfig");
        s.field("hook", &self.hook.as_ref().map(|_| "<hook>"))
            .field("label", &self.label);
        #[cfg(feature = "async")]
        s.field("cancellation", &self.cancellation);
        s.finish()
    }
}

/// A single configuration step for a retry run.
///
/// Options are plain values, so new ones can be added without changing the
/// executor's signature. Later options override earlier ones of the same kind.
pub struct RetryOption<'a, E, H = ErrorHook<'a, E>> {
    apply: Box<dyn FnOnce(&mut ExecutionConfig<'a, E, H>) + 'a>,
}

impl<'a, E, H> RetryOption<'a, E, H> {
    fn new<F>(apply: F) -> Self
    where
        F: FnOnce(&mut ExecutionConfig<'a, E, H>) + 'a,
    {
        Self {
            apply: Box::new(apply),
        }
    }

    /// Apply this option to `config`.
    pub fn apply(self, config: &mut ExecutionConfig<'a, E, H>) {
        (self.apply)(config)
    }
}

impl<E, H> fmt::Debug for RetryOption<'_, E, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOption").finish_non_exhaustive()
    }
}

/// Call `hook` with the error of every failed attempt, before the policy
/// decides whether to retry.
///
/// Use it for logging or metrics. Its outcome never changes the run. The
/// blocking executors accept any closure; the async executor also needs it
/// to be `Send`.
///
/// # Examples
///
/// ```rust
/// use persevere::{on_error, retry_with, Simple};
/// use std::cell::RefCell;
///
/// let seen = RefCell::new(Vec::new());
/// let result = retry_with(
///     Simple::new(3),
///     || Err::<(), _>("boom"),
///     [on_error(|err: &&str| seen.borrow_mut().push(err.to_string()))],
/// );
///
/// assert!(result.is_err());
/// assert_eq!(seen.into_inner(), vec!["boom"; 3]);
/// ```
pub fn on_error<'a, E, H, F>(hook: F) -> RetryOption<'a, E, H>
where
    F: FnMut(&E) + IntoErrorHook<'a, E, H> + 'a,
    E: 'a,
    H: 'a,
{
    RetryOption::new(move |config: &mut ExecutionConfig<'a, E, H>| {
        config.hook = Some(hook.into_hook());
    })
}

/// Like [`on_error`], for callers holding an optional hook.
///
/// # Panics
///
/// Panics if `hook` is `None`: asking for a hook and passing none is a bug in
/// the caller, not a runtime condition.
pub fn on_error_opt<'a, E, H, F>(hook: Option<F>) -> RetryOption<'a, E, H>
where
    F: FnMut(&E) + IntoErrorHook<'a, E, H> + 'a,
    E: 'a,
    H: 'a,
{
    match hook {
        Some(hook) => on_error(hook),
        None => panic!("illegal use of api: cannot attach a missing error hook"),
    }
}

/// Label the run in log events.
pub fn named<'a, E, H, L>(label: L) -> RetryOption<'a, E, H>
where
    E: 'a,
    H: 'a,
    L: Into<String>,
{
    let label = label.into();
    RetryOption::new(move |config: &mut ExecutionConfig<'a, E, H>| {
        config.label = Some(label);
    })
}

/// Stop waiting between attempts as soon as `token` is cancelled.
///
/// Only the async executor watches the token; the run then ends with
/// [`StopReason::Cancelled`](crate::StopReason::Cancelled).
#[cfg(feature = "async")]
pub fn with_cancellation<'a, E: 'a, H: 'a>(
    token: tokio_util::sync::CancellationToken,
) -> RetryOption<'a, E, H> {
    RetryOption::new(move |config: &mut ExecutionConfig<'a, E, H>| {
        config.cancellation = Some(token);
    })
}
