//! End-to-end scenarios through the public API.

use persevere::prelude::*;
use persevere::testing::{Flaky, RecordingSleep};
use persevere::{assert_exhausted, from_fn, named, Retry, StopReason};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
enum FetchError {
    Timeout,
    NotFound,
    Aborted,
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Timeout => write!(f, "request timed out"),
            FetchError::NotFound => write!(f, "not found"),
            FetchError::Aborted => write!(f, "request aborted"),
        }
    }
}

impl std::error::Error for FetchError {}

impl Cancellation for FetchError {
    fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Aborted)
    }
}

#[test]
fn test_backoff_recovers_from_timeouts() {
    let sleeper = RecordingSleep::new();
    let policy = ExponentialBackoff::new(5, Duration::from_millis(100))
        .with_seed(7)
        .with_sleeper(sleeper.clone());
    let mut op = Flaky::new(3, FetchError::Timeout, "payload");

    let result = retry(policy, || op.call());

    assert_eq!(result, Ok("payload"));
    assert_eq!(op.calls(), 4);
    assert_eq!(sleeper.delays().len(), 3);
    assert_eq!(sleeper.delays()[0], Duration::from_millis(100));
}

#[test]
fn test_user_error_cancellation_stops_run() {
    let sleeper = RecordingSleep::new();
    let policy = Fixed::new(10, Duration::from_secs(1)).with_sleeper(sleeper.clone());
    let mut op = Flaky::always_failing(FetchError::Aborted);

    let exhausted = assert_exhausted!(retry(policy, || op.call()), 1);

    assert!(exhausted.is_cancelled());
    assert!(sleeper.delays().is_empty());
}

#[test]
fn test_retry_if_with_domain_errors() {
    let policy = Simple::new(5).retry_if(|err: &FetchError| *err == FetchError::Timeout);
    let mut calls = 0;

    let result = retry(policy, || {
        calls += 1;
        if calls == 1 {
            Err::<(), _>(FetchError::Timeout)
        } else {
            Err(FetchError::NotFound)
        }
    });

    assert_eq!(result.unwrap_err().final_error, FetchError::NotFound);
    assert_eq!(calls, 2);
}

#[test]
fn test_exhausted_error_chain() {
    use std::error::Error;

    let result = retry(Simple::new(2), || Err::<(), _>(FetchError::NotFound));
    let exhausted = result.unwrap_err();

    assert!(exhausted.to_string().contains("after 2 attempts"));
    assert!(exhausted.to_string().contains("not found"));
    assert_eq!(
        exhausted.source().map(|e| e.to_string()),
        Some("not found".to_string())
    );
    assert_eq!(exhausted.reason, StopReason::PolicyDeclined);
    assert_eq!(exhausted.into_error(), FetchError::NotFound);
}

#[test]
fn test_custom_policy_from_closure() {
    let mut seen = Vec::new();
    let policy = from_fn(|err: &FetchError| {
        seen.push(err.clone());
        seen.len() < 3
    });
    let mut op = Flaky::always_failing(FetchError::Timeout);

    let exhausted = assert_exhausted!(retry(policy, || op.call()), 3);

    assert_eq!(exhausted.final_error, FetchError::Timeout);
    assert_eq!(seen.len(), 3);
}

#[test]
fn test_builder_with_hook_and_label() {
    let mut logged = Vec::new();
    let mut op = Flaky::new(2, FetchError::Timeout, 10);

    let result = Retry::new()
        .policy(Simple::new(3))
        .named("fetch-user")
        .on_error(|err: &FetchError| logged.push(err.to_string()))
        .operation(|| op.call())
        .run();

    assert_eq!(result, Ok(10));
    assert_eq!(logged, vec!["request timed out", "request timed out"]);
}

#[test]
fn test_options_can_be_combined() {
    let mut hooks = 0;
    let mut op = Flaky::always_failing("offline");

    let result = retry_with(
        Simple::new(4),
        || op.call(),
        [named("sync"), on_error(|_: &&str| hooks += 1)],
    );

    assert_exhausted!(result, 4);
    assert_eq!(hooks, 4);
}

#[test]
fn test_boxed_policy_chosen_at_runtime() {
    let slow = false;
    let policy: Box<dyn Policy<&str>> = if slow {
        Box::new(Fixed::new(3, Duration::from_secs(1)))
    } else {
        Box::new(Simple::new(3))
    };
    let mut op = Flaky::always_failing("down");

    assert_exhausted!(retry(policy, || op.call()), 3);
}

#[cfg(feature = "async")]
mod async_scenarios {
    use super::*;
    use persevere::{retry_async, retry_async_with, with_cancellation};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_async_backoff_recovers() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result = retry_async(
            ExponentialBackoff::new(4, Duration::from_millis(1)).with_seed(5),
            || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(FetchError::Timeout)
                } else {
                    Ok("payload")
                }
            },
        )
        .await;

        assert_eq!(result, Ok("payload"));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_async_token_cancels_backoff() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let result = retry_async_with(
            Fixed::new(100, Duration::from_secs(30)),
            || async { Err::<(), _>(FetchError::Timeout) },
            [named("fetch"), with_cancellation(token)],
        )
        .await;

        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.reason, StopReason::Cancelled);
        assert_eq!(exhausted.final_error, FetchError::Timeout);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_async_config_policy() {
        let policy = persevere::PolicyConfig::Fixed {
            attempts: 3,
            delay: Duration::from_millis(1),
        }
        .build();

        let result = retry_async(policy, || async { Err::<(), _>("down") }).await;

        assert_exhausted!(result, 3);
    }
}
