// ABOUTME: Token bucket rate limiter for registry calls.
// ABOUTME: Wraps a direct governor limiter; a disabled config never waits.

use governor::Quota;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;

/// Rate limiter settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Sustained requests per second.
    #[serde(default = "default_rate")]
    pub requests_per_second: f64,

    /// Requests allowed back to back before throttling starts.
    #[serde(default = "default_burst")]
    pub burst: u32,
}

fn default_enabled() -> bool {
    true
}

fn default_rate() -> f64 {
    10.0
}

fn default_burst() -> u32 {
    20
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            requests_per_second: default_rate(),
            burst: default_burst(),
        }
    }
}

type DirectLimiter = governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Token bucket shared by every caller that talks to the same registry.
pub struct RateLimiter {
    inner: Option<DirectLimiter>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let inner = config
            .enabled
            .then(|| quota(config.requests_per_second, config.burst))
            .flatten()
            .map(governor::RateLimiter::direct);
        Self { inner }
    }

    /// A limiter that never waits.
    pub fn unlimited() -> Self {
        Self { inner: None }
    }

    /// Take one token, sleeping until one is available.
    pub async fn acquire(&self) {
        let Some(limiter) = &self.inner else {
            return;
        };
        if limiter.check().is_err() {
            tracing::debug!("rate limited, waiting for a token");
            limiter.until_ready().await;
        }
    }
}

/// One token every `1 / rate` seconds, so fractional rates keep their meaning.
fn quota(requests_per_second: f64, burst: u32) -> Option<Quota> {
    if !requests_per_second.is_finite() || requests_per_second <= 0.0 {
        return None;
    }
    let burst = NonZeroU32::new(burst.max(1)).unwrap_or(NonZeroU32::MIN);
    Quota::with_period(Duration::from_secs_f64(1.0 / requests_per_second))
        .map(|quota| quota.allow_burst(burst))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn burst_is_served_immediately() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            enabled: true,
            requests_per_second: 1.0,
            burst: 5,
        });
        let started = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn requests_beyond_burst_are_spaced_out() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            enabled: true,
            requests_per_second: 20.0,
            burst: 1,
        });
        let started = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        // Two refills at 20/s take about 100ms.
        assert!(started.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn disabled_limiter_never_waits() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            enabled: false,
            requests_per_second: 0.1,
            burst: 1,
        });
        let started = Instant::now();
        for _ in 0..100 {
            limiter.acquire().await;
        }
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn non_positive_rate_disables_limiting() {
        assert!(quota(0.0, 5).is_none());
        assert!(quota(f64::NAN, 5).is_none());
        assert!(quota(2.5, 0).is_some());
    }

    #[tokio::test]
    async fn fractional_rate_spaces_by_period() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            enabled: true,
            requests_per_second: 12.5,
            burst: 1,
        });
        let started = Instant::now();
        for _ in 0..2 {
            limiter.acquire().await;
        }
        // One refill at 12.5/s takes 80ms.
        assert!(started.elapsed() >= Duration::from_millis(70));
    }
}
