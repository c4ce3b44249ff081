//! # Persevere
//!
//! Run a fallible operation again until it works, or until a policy says to
//! stop.
//!
//! ## Philosophy
//!
//! - A **policy** is a small stateful object answering one question per
//!   failure: try again? It owns the waiting, too.
//! - The **executor** is a plain loop. It never sleeps on its own, never
//!   recurses, and never swallows the final error: it hands it back wrapped in
//!   [`RetryExhausted`].
//! - **Misuse panics.** A run without a policy or an operation is a bug, not
//!   an error to retry.
//!
//! ## Quick Example
//!
//! ```rust
//! use persevere::{retry, RetryExhausted, Simple};
//!
//! fn connect(attempt: &mut u32) -> Result<&'static str, String> {
//!     *attempt += 1;
//!     if *attempt < 3 {
//!         Err(format!("refused (attempt {})", attempt))
//!     } else {
//!         Ok("connected")
//!     }
//! }
//!
//! let mut attempt = 0;
//! assert_eq!(retry(Simple::new(3), || connect(&mut attempt)), Ok("connected"));
//!
//! let mut attempt = 0;
//! match retry(Simple::new(2), || connect(&mut attempt)) {
//!     Err(RetryExhausted { final_error, attempts, .. }) => {
//!         assert_eq!(attempts, 2);
//!         assert_eq!(final_error, "refused (attempt 2)");
//!     }
//!     Ok(_) => panic!("Expected exhaustion"),
//! }
//! ```
//!
//! ## Features
//!
//! - `tracing` (default): debug events for failed attempts and exhaustion
//! - `async`: [`retry_async`] on tokio, with cancellable delays
//! - `serde`: (de)serialize [`PolicyConfig`]
//! - `proptest`: `Arbitrary` for [`PolicyConfig`]

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod retry;
pub mod testing;

// Re-exports
pub use retry::{
    exponential_backoff, fixed, from_fn, named, on_error, on_error_opt, retry, retry_with, simple,
    AnyPolicy, Cancellation, Cancelled, ErrorHook, ExecutionConfig, ExponentialBackoff, Fixed,
    FnPolicy, IntoErrorHook, Policy, PolicyConfig, PolicyExt, Retry, RetryExhausted, RetryIf,
    RetryOption, SendErrorHook, Simple, Sleep, StopReason, ThreadSleep,
};

#[cfg(feature = "async")]
pub use retry::{retry_async, retry_async_with, with_cancellation, AsyncPolicy};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::retry::{
        on_error, retry, retry_with, Cancellation, Cancelled, ExponentialBackoff, Fixed, Policy,
        PolicyExt, RetryExhausted, Simple,
    };
}
