//! Retry budget and exponential backoff

use rand::Rng;
use std::time::Duration;

/// How many times a transient upload failure is retried, and how long to wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub backoff_base: Duration,
    /// Upper bound for any single delay (before jitter)
    pub max_backoff: Duration,
    /// Add up to 10% random jitter to each delay
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Deterministic policy without jitter
    pub fn fixed(max_retries: u32, backoff_base: Duration) -> Self {
        Self {
            max_retries,
            backoff_base,
            max_backoff: Duration::from_secs(5).max(backoff_base),
            jitter: false,
        }
    }

    /// First attempt plus every allowed retry
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Whether another attempt is allowed after `attempts_made` attempts
    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made <= self.max_retries
    }

    /// Delay before retry number `retry` (1-based): `base * 2^(retry-1)`, capped
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        let delay = self
            .backoff_base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff);

        if self.jitter {
            let spread = delay.as_millis() as u64 / 10;
            if spread > 0 {
                let extra = rand::thread_rng().gen_range(0..=spread);
                return delay + Duration::from_millis(extra);
            }
        }
        delay
    }
}
