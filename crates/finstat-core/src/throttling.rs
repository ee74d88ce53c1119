//! Per-provider rate limiting.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Backoff schedule recommended to callers that hit the limit.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub max_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_retries: 3,
        }
    }
}

/// Quota and backoff configuration for one upstream provider.
#[derive(Debug, Clone)]
pub struct ProviderPolicy {
    pub quota_window: Duration,
    pub quota_limit: u32,
    pub retry_backoff: BackoffPolicy,
}

impl ProviderPolicy {
    /// FMP free tier: 250 requests/day, enforced here as a per-minute budget.
    pub fn fmp_default() -> Self {
        Self {
            quota_window: Duration::from_secs(60),
            quota_limit: 10,
            retry_backoff: BackoffPolicy::default(),
        }
    }

    /// Alpha Vantage free tier: 5 requests/minute.
    pub fn alphavantage_default() -> Self {
        Self {
            quota_window: Duration::from_secs(60),
            quota_limit: 5,
            retry_backoff: BackoffPolicy::default(),
        }
    }
}

/// In-memory throttle that computes retry delays when budget runs out.
#[derive(Clone)]
pub struct ThrottlingQueue {
    limiter: Arc<DirectRateLimiter>,
    retry_backoff: BackoffPolicy,
}

impl ThrottlingQueue {
    pub fn new(quota_window: Duration, quota_limit: u32, retry_backoff: BackoffPolicy) -> Self {
        let quota = quota_from_window(quota_window, quota_limit);
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            retry_backoff,
        }
    }

    pub fn from_policy(policy: &ProviderPolicy) -> Self {
        Self::new(
            policy.quota_window,
            policy.quota_limit,
            policy.retry_backoff.clone(),
        )
    }

    /// Tries to acquire rate budget. When budget is unavailable the
    /// recommended backoff delay is returned instead.
    pub fn acquire(&self) -> Result<(), Duration> {
        if self.limiter.check().is_ok() {
            return Ok(());
        }
        Err(self
            .retry_delay(0)
            .unwrap_or(self.retry_backoff.max_delay))
    }

    pub fn retry_delay(&self, retry_count: u32) -> Option<Duration> {
        if retry_count > self.retry_backoff.max_retries {
            return None;
        }

        let scale = self.retry_backoff.multiplier.powf(f64::from(retry_count));
        let seconds = self.retry_backoff.initial_delay.as_secs_f64() * scale;
        let capped_seconds = seconds.min(self.retry_backoff.max_delay.as_secs_f64());
        Some(Duration::from_secs_f64(capped_seconds))
    }
}

fn quota_from_window(window: Duration, limit: u32) -> Quota {
    let limit = NonZeroU32::new(limit.max(1)).expect("limit is at least one");
    let period = window
        .checked_div(limit.get())
        .filter(|p| !p.is_zero())
        .unwrap_or(Duration::from_secs(1));
    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(limit))
        .allow_burst(limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_fails_with_delay_once_budget_is_spent() {
        let queue = ThrottlingQueue::new(Duration::from_secs(60), 2, BackoffPolicy::default());

        assert!(queue.acquire().is_ok());
        assert!(queue.acquire().is_ok());

        let delay = queue.acquire().expect_err("budget should be exhausted");
        assert!(delay >= Duration::from_millis(500));
    }

    #[test]
    fn retry_delay_grows_and_caps() {
        let queue = ThrottlingQueue::new(
            Duration::from_secs(60),
            1,
            BackoffPolicy {
                initial_delay: Duration::from_millis(100),
                max_delay: Duration::from_millis(350),
                multiplier: 2.0,
                max_retries: 3,
            },
        );

        assert_eq!(queue.retry_delay(0), Some(Duration::from_millis(100)));
        assert_eq!(queue.retry_delay(1), Some(Duration::from_millis(200)));
        assert_eq!(queue.retry_delay(2), Some(Duration::from_millis(350)));
        assert_eq!(queue.retry_delay(4), None);
    }
}
