//! Bounded retry policy and the clock the search adapter waits on.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use repoharvest_shared::RetryConfig;

/// Explicit retry budget for the search adapter.
///
/// Transient failures retry up to `max_attempts` times per page with
/// exponential backoff. Rate-limit signals wait for the host-indicated time,
/// clamped to `max_rate_limit_wait`, at most `max_rate_limit_waits` times per
/// search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub max_rate_limit_waits: u32,
    pub max_rate_limit_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_backoff: Duration::from_millis(config.base_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            max_rate_limit_waits: config.max_rate_limit_waits,
            max_rate_limit_wait: Duration::from_secs(config.max_rate_limit_wait_secs),
        }
    }
}

impl RetryPolicy {
    /// Backoff after the `failures`-th consecutive transient failure (1-based).
    pub fn backoff_for(&self, failures: u32) -> Duration {
        let exp = failures.saturating_sub(1).min(16);
        self.base_backoff
            .saturating_mul(1u32 << exp)
            .min(self.max_backoff)
    }

    /// Wait actually taken for a host-requested rate-limit delay.
    pub fn rate_limit_wait(&self, requested: Duration) -> Duration {
        requested.min(self.max_rate_limit_wait)
    }
}

/// Source of time for waits and budgets.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    /// Suspend the caller for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
