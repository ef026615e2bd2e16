//! Retrying failed exports with exponential backoff and jitter.
//!
//! Retries run on the pipeline's own worker thread, so the delay between
//! attempts is a plain thread sleep and never touches the recording path.
use crate::error::{SdkError, SdkResult};
use crate::beacon_warn;
use rand::Rng;
use std::cmp::min;
use std::thread;
use std::time::Duration;

const DEFAULT_MAX_RETRIES: usize = 3;
const DEFAULT_INITIAL_DELAY_MS: u64 = 100;
const DEFAULT_MAX_DELAY_MS: u64 = 1_600;
const DEFAULT_JITTER_MS: u64 = 100;

/// Configuration for retrying a failed export.
///
/// The delay starts at `initial_delay_ms`, doubles after every attempt and is
/// capped at `max_delay_ms`. A random jitter of up to `jitter_ms` is added to
/// each delay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the first failure.
    pub max_retries: usize,
    /// Initial delay in milliseconds before the first retry.
    pub initial_delay_ms: u64,
    /// Maximum delay in milliseconds between retries.
    pub max_delay_ms: u64,
    /// Maximum jitter in milliseconds to add to the delay.
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter_ms: DEFAULT_JITTER_MS,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub const fn none() -> Self {
        RetryPolicy {
            max_retries: 0,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            jitter_ms: 0,
        }
    }
}

fn generate_jitter(max_jitter: u64) -> u64 {
    if max_jitter == 0 {
        return 0;
    }
    rand::rng().random_range(0..=max_jitter)
}

/// Runs `operation` until it succeeds or the retry budget is spent.
///
/// Only [`SdkError::ExportFailure`] is retried. Any other error is returned
/// right away.
pub(crate) fn retry_with_exponential_backoff<T, F>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> SdkResult<T>
where
    F: FnMut() -> SdkResult<T>,
{
    let mut attempt = 0;
    let mut delay = policy.initial_delay_ms;

    loop {
        match operation() {
            Ok(result) => return Ok(result),
            Err(err @ SdkError::ExportFailure(_)) if attempt < policy.max_retries => {
                attempt += 1;
                beacon_warn!(
                    name: "Export.Retry",
                    operation = operation_name,
                    attempt = attempt,
                    error = format!("{err}")
                );
                let delay_with_jitter =
                    min(delay + generate_jitter(policy.jitter_ms), policy.max_delay_ms);
                thread::sleep(Duration::from_millis(delay_with_jitter));
                delay = min(delay.saturating_mul(2), policy.max_delay_ms);
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast_policy(max_retries: usize) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_delay_ms: 1,
            max_delay_ms: 4,
            jitter_ms: 1,
        }
    }

    #[test]
    fn jitter_stays_within_bounds() {
        for _ in 0..100 {
            assert!(generate_jitter(10) <= 10);
        }
        assert_eq!(generate_jitter(0), 0);
    }

    #[test]
    fn succeeds_on_first_attempt() {
        let attempts = Cell::new(0);
        let result = retry_with_exponential_backoff(&fast_policy(3), "test", || {
            attempts.set(attempts.get() + 1);
            Ok("done")
        });
        assert_eq!(result, Ok("done"));
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn retries_until_success() {
        let attempts = Cell::new(0);
        let result = retry_with_exponential_backoff(&fast_policy(3), "test", || {
            attempts.set(attempts.get() + 1);
            if attempts.get() < 3 {
                Err(SdkError::ExportFailure("unavailable".into()))
            } else {
                Ok(())
            }
        });
        assert_eq!(result, Ok(()));
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn gives_up_after_budget() {
        let attempts = Cell::new(0);
        let result: SdkResult<()> = retry_with_exponential_backoff(&fast_policy(3), "test", || {
            attempts.set(attempts.get() + 1);
            Err(SdkError::ExportFailure("unavailable".into()))
        });
        assert!(matches!(result, Err(SdkError::ExportFailure(_))));
        assert_eq!(attempts.get(), 4);
    }

    #[test]
    fn non_export_errors_are_not_retried() {
        let attempts = Cell::new(0);
        let result: SdkResult<()> = retry_with_exponential_backoff(&fast_policy(3), "test", || {
            attempts.set(attempts.get() + 1);
            Err(SdkError::AlreadyShutdown)
        });
        assert_eq!(result, Err(SdkError::AlreadyShutdown));
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn no_retry_policy_makes_one_attempt() {
        let attempts = Cell::new(0);
        let _ = retry_with_exponential_backoff(&RetryPolicy::none(), "test", || {
            attempts.set(attempts.get() + 1);
            Err::<(), _>(SdkError::ExportFailure("unavailable".into()))
        });
        assert_eq!(attempts.get(), 1);
    }
}
