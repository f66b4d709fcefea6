//! Exponential backoff for rate-limited upstream calls.
//!
//! Wrap each individual network call (not a whole lookup) in
//! [`BackoffExecutor::execute`]:
//!
//! ```ignore
//! let body = backoff.execute(|| http::send_json(client.get(&url))).await?;
//! ```
//!
//! Only [`SourceError::RateLimited`] triggers a retry. Every other error is
//! returned to the caller on the spot.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::SourceError;

/// Default number of retries after the first call.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default upper bound on any single delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Retries rate-limited operations with exponential delay and jitter.
///
/// The delay before retry `n` (zero-based) is
/// `min(base_delay * 2^n + jitter, max_delay)` where `jitter` is drawn
/// uniformly from `[0, 1)` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffExecutor {
    base_delay: Duration,
    max_delay: Duration,
    max_retries: u32,
}

impl Default for BackoffExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY, DEFAULT_MAX_RETRIES)
    }
}

impl BackoffExecutor {
    /// Creates an executor with explicit parameters.
    #[must_use]
    pub const fn new(base_delay: Duration, max_delay: Duration, max_retries: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_retries,
        }
    }

    /// Number of retries after the first call.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Computes the delay before retry `attempt` for a given jitter (in
    /// seconds).
    #[must_use]
    pub fn delay_for(&self, attempt: u32, jitter: f64) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let raw = self.base_delay.as_secs_f64().mul_add(2f64.powi(exponent), jitter);
        let capped = raw.min(self.max_delay.as_secs_f64()).max(0.0);
        Duration::from_secs_f64(capped)
    }

    /// Calls `operation` until it succeeds, fails with a non-rate-limit
    /// error, or has been called `max_retries + 1` times.
    ///
    /// # Errors
    ///
    /// Returns the operation's own error if it is not a rate limit, or
    /// [`SourceError::RateLimitExceeded`] if every call was rate limited.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, SourceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let attempts = self.max_retries.saturating_add(1);

        for attempt in 0..attempts {
            match operation().await {
                Err(e) if e.is_rate_limited() => {
                    if attempt + 1 == attempts {
                        log::warn!("{e}; giving up after {attempts} attempts");
                        break;
                    }
                    let jitter = rand::thread_rng().gen_range(0.0..1.0);
                    let delay = self.delay_for(attempt, jitter);
                    log::warn!(
                        "{e}; retry {}/{} in {delay:.2?}",
                        attempt + 1,
                        self.max_retries
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }

        Err(SourceError::RateLimitExceeded { attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate_limited() -> SourceError {
        SourceError::RateLimited {
            url: "https://api.example.com".to_owned(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_max_retries_rate_limits() {
        let executor = BackoffExecutor::default();
        let mut calls = 0u32;
        let result = executor
            .execute(|| {
                calls += 1;
                let n = calls;
                async move { if n <= 3 { Err(rate_limited()) } else { Ok(n) } }
            })
            .await;
        assert_eq!(result.unwrap(), 4);
        assert_eq!(calls, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_when_always_rate_limited() {
        let executor = BackoffExecutor::default();
        let mut calls = 0u32;
        let result: Result<(), _> = executor
            .execute(|| {
                calls += 1;
                async { Err(rate_limited()) }
            })
            .await;
        assert!(matches!(
            result,
            Err(SourceError::RateLimitExceeded { attempts: 4 })
        ));
        assert_eq!(calls, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn other_errors_fail_fast() {
        let executor = BackoffExecutor::default();
        let mut calls = 0u32;
        let result: Result<(), _> = executor
            .execute(|| {
                calls += 1;
                async {
                    Err(SourceError::Status {
                        status: 500,
                        url: "https://api.example.com".to_owned(),
                    })
                }
            })
            .await;
        assert!(matches!(result, Err(SourceError::Status { status: 500, .. })));
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_grow_exponentially() {
        let executor = BackoffExecutor::default();
        let start = tokio::time::Instant::now();
        let _: Result<(), _> = executor.execute(|| async { Err(rate_limited()) }).await;
        let elapsed = start.elapsed();
        // 1s + 2s + 4s plus up to 1s of jitter per retry.
        assert!(elapsed >= Duration::from_secs(7), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(10), "{elapsed:?}");
    }

    #[test]
    fn delay_is_capped() {
        let executor =
            BackoffExecutor::new(Duration::from_secs(1), Duration::from_secs(60), 10);
        assert_eq!(executor.delay_for(0, 0.0), Duration::from_secs(1));
        assert_eq!(executor.delay_for(3, 0.5), Duration::from_millis(8500));
        assert_eq!(executor.delay_for(6, 0.0), Duration::from_secs(60));
        assert_eq!(executor.delay_for(40, 0.9), Duration::from_secs(60));
    }
}
