//! Declarative policy definitions.
//!
//! A [`PolicyConfig`] is plain data describing one of the built-in policies,
//! convenient to keep in application settings. It is not a policy itself:
//! call [`PolicyConfig::build`] for a fresh, stateful policy at the start of
//! every run.
//!
//! With the `serde` feature it (de)serializes as an internally tagged map,
//! delays in milliseconds:
//!
//! ```json
//! { "kind": "exponential_backoff", "attempts": 5, "initial_delay_ms": 100 }
//! ```

use std::time::Duration;

use super::cancel::Cancellation;
use super::policy::{ExponentialBackoff, Fixed, Policy, Simple};

/// Description of a built-in retry policy.
///
/// # Examples
///
/// ```rust
/// use persevere::{retry, PolicyConfig};
/// use std::time::Duration;
///
/// let config = PolicyConfig::Fixed {
///     attempts: 2,
///     delay: Duration::from_millis(1),
/// };
/// assert!(config.validate().is_ok());
///
/// let result = retry(config.build(), || Err::<(), _>("down"));
/// assert_eq!(result.unwrap_err().attempts, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum PolicyConfig {
    /// [`Simple`]: retry without delay.
    Simple {
        /// Total invocations allowed.
        attempts: u32,
    },
    /// [`Fixed`]: retry after a constant delay.
    Fixed {
        /// Total invocations allowed.
        attempts: u32,
        /// Delay between attempts.
        #[cfg_attr(feature = "serde", serde(rename = "delay_ms", with = "millis"))]
        delay: Duration,
    },
    /// [`ExponentialBackoff`]: retry after a jittered, doubling delay.
    ExponentialBackoff {
        /// Total invocations allowed.
        attempts: u32,
        /// Delay before the first retry.
        #[cfg_attr(feature = "serde", serde(rename = "initial_delay_ms", with = "millis"))]
        initial_delay: Duration,
    },
}

impl PolicyConfig {
    /// Total invocations the described policy allows.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Simple { attempts }
            | Self::Fixed { attempts, .. }
            | Self::ExponentialBackoff { attempts, .. } => *attempts,
        }
    }

    /// Check that the description is usable.
    ///
    /// A zero attempt budget is legal for a constructed policy (the operation
    /// still runs once) but in a config file it almost always means a missing
    /// value, so it is rejected here.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.attempts() == 0 {
            Err("PolicyConfig must allow at least one attempt")
        } else {
            Ok(())
        }
    }

    /// Build a fresh policy from this description.
    pub fn build(&self) -> AnyPolicy {
        match *self {
            Self::Simple { attempts } => AnyPolicy::Simple(Simple::new(attempts)),
            Self::Fixed { attempts, delay } => AnyPolicy::Fixed(Fixed::new(attempts, delay)),
            Self::ExponentialBackoff {
                attempts,
                initial_delay,
            } => AnyPolicy::ExponentialBackoff(ExponentialBackoff::new(attempts, initial_delay)),
        }
    }
}

/// One of the built-in policies, chosen at runtime.
///
/// Produced by [`PolicyConfig::build`].
#[derive(Debug)]
pub enum AnyPolicy {
    /// See [`Simple`].
    Simple(Simple),
    /// See [`Fixed`].
    Fixed(Fixed),
    /// See [`ExponentialBackoff`].
    ExponentialBackoff(ExponentialBackoff),
}

impl AnyPolicy {
    /// Attempts still available to this run.
    pub fn remaining(&self) -> u32 {
        match self {
            Self::Simple(p) => p.remaining(),
            Self::Fixed(p) => p.remaining(),
            Self::ExponentialBackoff(p) => p.remaining(),
        }
    }

    /// Record a failure and return the delay before the next attempt, or
    /// `None` to stop. Does not sleep.
    pub fn next_delay<E: Cancellation + ?Sized>(&mut self, error: &E) -> Option<Duration> {
        match self {
            Self::Simple(p) => p.next_delay(error),
            Self::Fixed(p) => p.next_delay(error),
            Self::ExponentialBackoff(p) => p.next_delay(error),
        }
    }
}

impl<E: Cancellation> Policy<E> for AnyPolicy {
    fn should_retry(&mut self, error: &E) -> bool {
        match self {
            Self::Simple(p) => p.should_retry(error),
            Self::Fixed(p) => p.should_retry(error),
            Self::ExponentialBackoff(p) => p.should_retry(error),
        }
    }
}

#[cfg(feature = "async")]
impl<E: Cancellation> super::async_exec::AsyncPolicy<E> for AnyPolicy {
    fn should_retry<'a>(&'a mut self, error: &'a E) -> futures::future::BoxFuture<'a, bool> {
        use super::async_exec::AsyncPolicy;
        match self {
            Self::Simple(p) => AsyncPolicy::should_retry(p, error),
            Self::Fixed(p) => AsyncPolicy::should_retry(p, error),
            Self::ExponentialBackoff(p) => AsyncPolicy::should_retry(p, error),
        }
    }
}

#[cfg(feature = "serde")]
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(feature = "proptest")]
use proptest::prelude::*;

#[cfg(feature = "proptest")]
impl Arbitrary for PolicyConfig {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    /// Small budgets and delays, so generated policies are quick to exhaust.
    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        let delay = (0u64..5).prop_map(Duration::from_millis);
        prop_oneof![
            (1u32..10).prop_map(|attempts| PolicyConfig::Simple { attempts }),
            (1u32..10, delay.clone())
                .prop_map(|(attempts, delay)| PolicyConfig::Fixed { attempts, delay }),
            (1u32..10, delay).prop_map(|(attempts, initial_delay)| {
                PolicyConfig::ExponentialBackoff {
                    attempts,
                    initial_delay,
                }
            }),
        ]
        .boxed()
    }
}
