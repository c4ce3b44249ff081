//! Property-based tests for the retry executors

use persevere::testing::{Flaky, RecordingSleep};
use persevere::{on_error, retry, retry_with, ExponentialBackoff, Fixed, PolicyConfig, Simple};
use proptest::prelude::*;
use std::time::Duration;

fn config_strategy() -> impl Strategy<Value = PolicyConfig> {
    prop_oneof![
        (1u32..20).prop_map(|attempts| PolicyConfig::Simple { attempts }),
        (1u32..20).prop_map(|attempts| PolicyConfig::Fixed {
            attempts,
            delay: Duration::ZERO,
        }),
        (1u32..20).prop_map(|attempts| PolicyConfig::ExponentialBackoff {
            attempts,
            initial_delay: Duration::ZERO,
        }),
    ]
}

proptest! {
    #[test]
    fn prop_always_failing_runs_exactly_n_times(n in 1u32..200) {
        let mut op = Flaky::always_failing("boom");
        let mut hooks = 0u32;

        let result = retry_with(Simple::new(n), || op.call(), [on_error(|_: &&str| hooks += 1)]);

        let exhausted = result.unwrap_err();
        prop_assert_eq!(exhausted.attempts, n);
        prop_assert_eq!(op.calls(), n);
        prop_assert_eq!(hooks, n);
        prop_assert_eq!(exhausted.final_error, "boom");
    }

    #[test]
    fn prop_recovers_when_failures_fit_budget(n in 1u32..100, k in 0u32..100) {
        prop_assume!(k < n);
        let mut op = Flaky::new(k, "transient", k);

        let result = retry(Simple::new(n), || op.call());

        prop_assert_eq!(result, Ok(k));
        prop_assert_eq!(op.calls(), k + 1);
    }

    #[test]
    fn prop_gives_up_when_failures_exceed_budget(n in 1u32..50, extra in 0u32..50) {
        let mut op = Flaky::new(n + extra, "transient", ());

        let result = retry(Simple::new(n), || op.call());

        prop_assert_eq!(result.unwrap_err().attempts, n);
        prop_assert_eq!(op.calls(), n);
    }

    #[test]
    fn prop_success_invoked_once(config in config_strategy()) {
        let mut op = Flaky::new(0, "never", 1);
        let mut hooks = 0u32;

        let result = retry_with(config.build(), || op.call(), [on_error(|_: &&str| hooks += 1)]);

        prop_assert_eq!(result, Ok(1));
        prop_assert_eq!(op.calls(), 1);
        prop_assert_eq!(hooks, 0);
    }

    #[test]
    fn prop_config_budget_is_honored(config in config_strategy()) {
        let mut op = Flaky::always_failing("down");

        let result = retry(config.build(), || op.call());

        prop_assert_eq!(result.unwrap_err().attempts, config.attempts());
        prop_assert_eq!(op.calls(), config.attempts());
    }

    #[test]
    fn prop_fixed_sleeps_between_attempts_only(n in 1u32..30, millis in 1u64..1000) {
        let sleeper = RecordingSleep::new();
        let delay = Duration::from_millis(millis);
        let policy = Fixed::new(n, delay).with_sleeper(sleeper.clone());
        let mut op = Flaky::always_failing("down");

        let _ = retry(policy, || op.call());

        prop_assert_eq!(sleeper.delays().len() as u32, n - 1);
        prop_assert_eq!(sleeper.total(), delay * (n - 1));
    }

    #[test]
    fn prop_backoff_delays_stay_in_jitter_band(seed in any::<u64>(), n in 2u32..12) {
        let sleeper = RecordingSleep::new();
        let initial = Duration::from_millis(10);
        let policy = ExponentialBackoff::new(n, initial)
            .with_seed(seed)
            .with_sleeper(sleeper.clone());
        let mut op = Flaky::always_failing("down");

        let _ = retry(policy, || op.call());

        let delays = sleeper.delays();
        prop_assert_eq!(delays.len() as u32, n - 1);
        prop_assert_eq!(delays[0], initial);
        for pair in delays.windows(2) {
            let ratio = pair[1].as_secs_f64() / pair[0].as_secs_f64();
            prop_assert!((0.5 - 1e-3..2.5 + 1e-3).contains(&ratio), "ratio {}", ratio);
        }
    }
}
