//! Recognising cancellation in operation errors.
//!
//! Retrying an operation whose caller already gave up is never correct, so
//! every built-in policy stops as soon as it sees an error that reports
//! [`Cancellation::is_cancelled`]. Operations surface cancellation by
//! returning [`Cancelled`] (directly, inside an `io::Error`, or anywhere in a
//! boxed error's source chain) or by implementing [`Cancellation`] on their
//! own error type.

use std::error::Error as StdError;
use std::fmt;

/// Errors that can report an upstream cancellation.
///
/// # Examples
///
/// ```rust
/// use persevere::Cancellation;
///
/// #[derive(Debug)]
/// enum FetchError {
///     Timeout,
///     Aborted,
/// }
///
/// impl Cancellation for FetchError {
///     fn is_cancelled(&self) -> bool {
///         matches!(self, FetchError::Aborted)
///     }
/// }
///
/// assert!(FetchError::Aborted.is_cancelled());
/// assert!(!FetchError::Timeout.is_cancelled());
/// ```
pub trait Cancellation {
    /// Returns true if this error means the caller cancelled the operation.
    fn is_cancelled(&self) -> bool;
}

/// Marker error meaning "the operation was cancelled".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("operation cancelled")
    }
}

impl StdError for Cancelled {}

impl Cancellation for Cancelled {
    fn is_cancelled(&self) -> bool {
        true
    }
}

impl<T: Cancellation + ?Sized> Cancellation for &T {
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}

impl Cancellation for str {
    fn is_cancelled(&self) -> bool {
        false
    }
}

impl Cancellation for String {
    fn is_cancelled(&self) -> bool {
        false
    }
}

impl Cancellation for std::io::Error {
    fn is_cancelled(&self) -> bool {
        self.get_ref().is_some_and(|inner| chain_contains_cancelled(inner))
    }
}

impl Cancellation for Box<dyn StdError + Send + Sync> {
    fn is_cancelled(&self) -> bool {
        chain_contains_cancelled(self.as_ref())
    }
}

impl Cancellation for Box<dyn StdError> {
    fn is_cancelled(&self) -> bool {
        chain_contains_cancelled(self.as_ref())
    }
}

/// Walk the source chain looking for a [`Cancelled`] marker.
fn chain_contains_cancelled(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        if err.is::<Cancelled>() {
            return true;
        }
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if io.is_cancelled() {
                return true;
            }
        }
        current = err.source();
    }
    false
}
