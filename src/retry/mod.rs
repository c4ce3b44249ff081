//! Policy-driven retry for fallible operations.
//!
//! The moving parts:
//!
//! - **Policies** decide, failure by failure, whether to try again. They own
//!   their state (remaining attempts, current delay) and perform any wait
//!   themselves.
//! - **Executors** ([`retry`], [`retry_with`], [`Retry`], and with the `async`
//!   feature [`retry_async`]) run the operation in a loop, report each error
//!   to the optional hook, then ask the policy.
//! - **Options** ([`on_error`], [`named`], and with the `async` feature
//!   [`with_cancellation`]) configure a single run.
//!
//! # Quick Start
//!
//! ```rust
//! use persevere::{retry_with, on_error, ExponentialBackoff};
//! use std::time::Duration;
//!
//! let mut attempts = 0;
//! let mut logged = 0;
//!
//! let result = retry_with(
//!     ExponentialBackoff::new(5, Duration::from_millis(1)),
//!     || {
//!         attempts += 1;
//!         if attempts < 3 { Err("connection reset") } else { Ok(attempts) }
//!     },
//!     [on_error(|_: &&str| logged += 1)],
//! );
//!
//! assert_eq!(result, Ok(3));
//! assert_eq!(logged, 2);
//! ```
//!
//! # Built-in Policies
//!
//! - [`Simple`]: up to N attempts, no delay
//! - [`Fixed`]: up to N attempts, constant delay
//! - [`ExponentialBackoff`]: up to N attempts, delay doubling with jitter in
//!   `[0.25, 1.25)`
//! - [`from_fn`]: any `FnMut(&E) -> bool`
//!
//! Every built-in stops at once on an error that reports
//! [`Cancellation::is_cancelled`].
//!
//! # Error Types
//!
//! - [`RetryExhausted`]: returned when the run gives up; wraps the final error
//! - [`Cancelled`]: marker error an operation returns when its caller cancelled

mod cancel;
mod config;
mod error;
mod executor;
mod options;
mod policy;
mod sleep;

#[cfg(feature = "async")]
mod async_exec;

pub use cancel::{Cancellation, Cancelled};
pub use config::{AnyPolicy, PolicyConfig};
pub use error::{RetryExhausted, StopReason};
pub use executor::{retry, retry_with, Retry};
pub use options::{
    named, on_error, on_error_opt, ErrorHook, ExecutionConfig, IntoErrorHook, RetryOption,
    SendErrorHook,
};
pub use policy::{
    exponential_backoff, fixed, from_fn, simple, ExponentialBackoff, Fixed, FnPolicy, Policy,
    PolicyExt, RetryIf, Simple, JITTER_MAX, JITTER_MIN,
};
pub use sleep::{Sleep, ThreadSleep};

#[cfg(feature = "async")]
pub use async_exec::{retry_async, retry_async_with, AsyncPolicy};
#[cfg(feature = "async")]
pub use options::with_cancellation;
