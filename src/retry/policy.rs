// ABOUTME: Exponential backoff with jitter around fallible async operations.
// ABOUTME: Stops immediately on permanent failures and after the retry budget otherwise.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::Deserialize;

use super::classify::Classify;

/// Fraction of the computed delay used as the jitter range (±10%).
const JITTER_FRACTION: f64 = 0.1;

/// Jittered delays never drop below this.
const MIN_JITTERED_DELAY: Duration = Duration::from_millis(100);

/// Backoff parameters for retried operations.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts is `max_retries + 1`.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_delay", with = "humantime_serde")]
    pub initial_delay: Duration,

    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,

    #[serde(default = "default_exponential_base")]
    pub exponential_base: f64,

    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_exponential_base() -> f64 {
    2.0
}

fn default_jitter() -> bool {
    true
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            exponential_base: default_exponential_base(),
            jitter: default_jitter(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps and never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            exponential_base: 1.0,
            jitter: false,
        }
    }

    /// Delay before retry number `attempt` (0-based).
    ///
    /// `min(initial_delay * base^attempt, max_delay)`, then jittered by ±10%
    /// when enabled.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let raw = self.initial_delay.as_secs_f64() * self.exponential_base.powi(exp);
        let capped = raw.min(self.max_delay.as_secs_f64());
        // Covers NaN and infinities from extreme bases.
        let capped = if capped.is_finite() && capped > 0.0 {
            capped
        } else if raw.is_infinite() {
            self.max_delay.as_secs_f64()
        } else {
            0.0
        };

        if !self.jitter {
            return Duration::from_secs_f64(capped);
        }

        let spread = capped * JITTER_FRACTION;
        let jittered = capped + spread * jitter_unit();
        Duration::from_secs_f64(jittered).max(MIN_JITTERED_DELAY)
    }

    /// Run `operation` until it succeeds, fails permanently, or the retry
    /// budget is spent. The last error is returned on failure.
    pub async fn retry<T, E, F, Fut>(&self, name: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!("{} succeeded on attempt {}", name, attempt + 1);
                    }
                    return Ok(value);
                }
                Err(err) => {
                    let class = err.class();
                    if !class.is_retryable() {
                        tracing::error!("{} failed with non-retryable error ({}): {}", name, class, err);
                        return Err(err);
                    }
                    if attempt >= self.max_retries {
                        tracing::error!(
                            "{} failed after {} attempts, last error ({}): {}",
                            name,
                            attempt + 1,
                            class,
                            err
                        );
                        return Err(err);
                    }

                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        "{} failed on attempt {}/{} ({} error: {}), retrying in {:.2}s",
                        name,
                        attempt + 1,
                        self.max_retries + 1,
                        class,
                        err,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Like [`RetryPolicy::retry`], but `Ok(None)` also counts as a failed
    /// attempt. Errors and empty results draw from the same budget. Once it
    /// is spent the last outcome is returned as-is.
    pub async fn retry_optional<T, E, F, Fut>(
        &self,
        name: &str,
        mut operation: F,
    ) -> Result<Option<T>, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
        E: Classify + Display,
    {
        let mut attempt = 0;
        loop {
            let result = operation().await;
            let reason = match &result {
                Ok(Some(_)) => return result,
                Ok(None) => "no value".to_string(),
                Err(err) => {
                    let class = err.class();
                    if !class.is_retryable() {
                        tracing::error!("{} failed with non-retryable error ({}): {}", name, class, err);
                        return result;
                    }
                    format!("{} error: {}", class, err)
                }
            };
            if attempt >= self.max_retries {
                tracing::error!("{} gave up after {} attempts ({})", name, attempt + 1, reason);
                return result;
            }

            let delay = self.delay_for(attempt);
            tracing::warn!(
                "{} attempt {}/{} produced {}, retrying in {:.2}s",
                name,
                attempt + 1,
                self.max_retries + 1,
                reason,
                delay.as_secs_f64()
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Uniform value in [-1.0, 1.0).
fn jitter_unit() -> f64 {
    fastrand::f64() * 2.0 - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::ErrorClass;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError(ErrorClass);

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error ({})", self.0)
        }
    }

    impl Classify for TestError {
        fn class(&self) -> ErrorClass {
            self.0
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            exponential_base: 2.0,
            jitter: false,
        }
    }

    #[test]
    fn delay_grows_exponentially_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            exponential_base: 2.0,
            jitter: false,
        };
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(4), Duration::from_secs(10));
        assert_eq!(policy.delay_for(60), Duration::from_secs(10));
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(60),
            ..RetryPolicy::default()
        };
        for _ in 0..50 {
            let d = policy.delay_for(0).as_secs_f64();
            assert!((9.0..=11.0).contains(&d), "delay {d} out of range");
        }
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            initial_delay: Duration::from_secs(30),
            ..RetryPolicy::default()
        };

        let started = std::time::Instant::now();
        let result: Result<(), _> = policy
            .retry("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError(ErrorClass::Permanent)) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn network_error_retries_until_budget_spent() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy(3)
            .retry("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError(ErrorClass::Network)) }
            })
            .await;

        assert_eq!(result.unwrap_err().0, ErrorClass::Network);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .retry("op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(TestError(ErrorClass::Temporary))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn none_is_retried_then_returned() {
        let calls = AtomicU32::new(0);
        let result: Result<Option<u32>, TestError> = fast_policy(2)
            .retry_optional("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(None) }
            })
            .await;

        assert_eq!(result.unwrap(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn some_after_none_is_returned() {
        let calls = AtomicU32::new(0);
        let result: Result<Option<u32>, TestError> = fast_policy(2)
            .retry_optional("op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(if n == 0 { None } else { Some(7) }) }
            })
            .await;

        assert_eq!(result.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn errors_and_empty_results_share_one_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<Option<u32>, TestError> = fast_policy(2)
            .retry_optional("op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n % 2 == 0 {
                        Err(TestError(ErrorClass::Network))
                    } else {
                        Ok(None)
                    }
                }
            })
            .await;

        // Attempts 0 and 2 fail, attempt 1 is empty; the third attempt is the last.
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_stops_optional_retry() {
        let calls = AtomicU32::new(0);
        let result: Result<Option<u32>, TestError> = fast_policy(5)
            .retry_optional("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError(ErrorClass::Permanent)) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn jitter_unit_is_bounded_and_varies() {
        let samples: Vec<f64> = (0..64).map(|_| jitter_unit()).collect();
        assert!(samples.iter().all(|u| (-1.0..1.0).contains(u)));
        assert!(samples.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn policy_deserializes_humantime_durations() {
        let policy: RetryPolicy = serde_yaml::from_str(
            "max_retries: 5\ninitial_delay: 500ms\nmax_delay: 2m\njitter: false\n",
        )
        .unwrap();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.initial_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_secs(120));
        assert_eq!(policy.exponential_base, 2.0);
        assert!(!policy.jitter);
    }
}
