//! Bounded retry loop with configurable backoff.
//!
//! [`with_retry`] wraps one full pipeline attempt (interpretation and
//! execution together). Failures classified retryable by
//! [`FluidError::is_retryable`] are re-attempted after a backoff sleep; fatal
//! failures abort immediately without consuming further attempts.

use crate::error::{FluidError, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// How the backoff delay is drawn from the policy bounds.
///
/// Defaults to randomized-within-bounds to avoid synchronized retry storms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackoffStrategy {
    /// Always sleep for the minimum bound.
    Fixed,
    /// Ramp linearly from the minimum, capped at the maximum.
    Linear,
    /// Uniform random draw from `[min, max]`.
    #[default]
    Randomized,
}

/// Configuration for retrying failed pipeline attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Lower backoff bound.
    pub backoff_min: Duration,

    /// Upper backoff bound.
    pub backoff_max: Duration,

    /// Delay selection strategy.
    pub strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_min: Duration::from_secs(2),
            backoff_max: Duration::from_secs(10),
            strategy: BackoffStrategy::default(),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given attempt budget and default backoff.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Set the backoff bounds.
    pub fn with_backoff_bounds(mut self, min: Duration, max: Duration) -> Self {
        self.backoff_min = min;
        self.backoff_max = max;
        self
    }

    /// Set the delay selection strategy.
    pub fn with_strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Delay to sleep after the given failed attempt (1-indexed).
    ///
    /// Every strategy yields a delay within `[backoff_min, backoff_max]`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let min = self.backoff_min.as_secs_f64();
        let max = self.backoff_max.as_secs_f64().max(min);
        let secs = match self.strategy {
            BackoffStrategy::Fixed => min,
            BackoffStrategy::Linear => (min * attempt as f64).min(max),
            BackoffStrategy::Randomized => {
                if max > min {
                    rand::thread_rng().gen_range(min..=max)
                } else {
                    min
                }
            }
        };
        Duration::from_secs_f64(secs)
    }
}

/// Run `operation` under `policy`, returning the value and the number of
/// attempts consumed.
///
/// The operation is re-run in full on each attempt: a stale generated request
/// may itself be the cause of failure, so interpretation is never reused
/// across attempts. Retrying a non-idempotent call may duplicate its remote
/// effect; that caveat is the caller's responsibility, no deduplication is
/// attempted here.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> Result<(T, u32)>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "attempt succeeded after retry");
                }
                return Ok((value, attempt));
            }
            Err(err) if err.is_fatal() => {
                debug!(attempt, error = %err, "fatal failure, aborting without retry");
                return Err(err);
            }
            Err(err) if attempt < max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "attempt failed, retrying after backoff"
                );
                sleep(delay).await;
            }
            Err(err) => {
                warn!(attempt, error = %err, "attempt failed, retry budget spent");
                return Err(FluidError::ExhaustedRetries {
                    attempts: attempt,
                    source: Box::new(err),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts)
            .with_backoff_bounds(Duration::from_millis(1), Duration::from_millis(5))
    }

    #[test]
    fn test_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff_min, Duration::from_secs(2));
        assert_eq!(policy.backoff_max, Duration::from_secs(10));
        assert_eq!(policy.strategy, BackoffStrategy::Randomized);
    }

    #[test]
    fn test_delay_within_bounds_for_all_strategies() {
        for strategy in [
            BackoffStrategy::Fixed,
            BackoffStrategy::Linear,
            BackoffStrategy::Randomized,
        ] {
            let policy = RetryPolicy::new(5)
                .with_backoff_bounds(Duration::from_secs(2), Duration::from_secs(10))
                .with_strategy(strategy);
            for attempt in 1..=10 {
                let delay = policy.delay_for(attempt);
                assert!(delay >= Duration::from_secs(2), "{strategy:?} attempt {attempt}");
                assert!(delay <= Duration::from_secs(10), "{strategy:?} attempt {attempt}");
            }
        }
    }

    #[test]
    fn test_linear_delay_ramps_then_caps() {
        let policy = RetryPolicy::new(10)
            .with_backoff_bounds(Duration::from_secs(2), Duration::from_secs(10))
            .with_strategy(BackoffStrategy::Linear);

        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(6));
        // 2 * 6 = 12, capped at 10
        assert_eq!(policy.delay_for(6), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failures() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result = with_retry(&fast_policy(3), || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(FluidError::Inference("backend unreachable".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        let (value, consumed) = result.unwrap();
        assert_eq!(value, 42);
        assert_eq!(consumed, 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_failure_aborts_without_sleep() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let policy = RetryPolicy::new(3)
            .with_backoff_bounds(Duration::from_secs(5), Duration::from_secs(5));

        let started = Instant::now();
        let result: Result<((), u32)> = with_retry(&policy, || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(FluidError::Validation {
                    field: "url".to_string(),
                    message: "not an absolute URI".to_string(),
                    raw: String::new(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(FluidError::Validation { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        // No backoff sleep for fatal failures.
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_exhausted_retries_wraps_last_failure() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<((), u32)> = with_retry(&fast_policy(3), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(FluidError::Inference("persistent outage".to_string()))
            }
        })
        .await;

        match result {
            Err(FluidError::ExhaustedRetries { attempts: n, source }) => {
                assert_eq!(n, 3);
                assert!(matches!(*source, FluidError::Inference(_)));
            }
            other => panic!("expected exhausted retries, got {other:?}"),
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_immediate_success_consumes_one_attempt() {
        let (value, consumed) = with_retry(&fast_policy(3), || async { Ok("ok") })
            .await
            .unwrap();
        assert_eq!(value, "ok");
        assert_eq!(consumed, 1);
    }
}
