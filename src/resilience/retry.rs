//! Exponential backoff with jitter.

use crate::hn::UpstreamError;
use rand::Rng;
use std::time::Duration;

/// How many times, and how patiently, a transient failure is retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each subsequent one.
    pub base_delay: Duration,
    /// Lower bound (inclusive) of the random jitter added to every delay.
    pub jitter_min: Duration,
    /// Upper bound (exclusive) of the random jitter.
    pub jitter_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
            jitter_min: Duration::from_millis(50),
            jitter_max: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Whether `err` deserves another attempt after `retries_so_far` retries.
    pub fn should_retry(&self, err: &UpstreamError, retries_so_far: u32) -> bool {
        err.is_transient() && retries_so_far < self.max_retries
    }

    /// Deterministic part of the delay before retry number `retry` (1-based).
    pub fn base_backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent)
    }

    /// Full delay before retry number `retry`: `base × 2^(retry-1)` plus jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        self.base_backoff(retry) + self.jitter()
    }

    fn jitter(&self) -> Duration {
        let min = self.jitter_min.as_millis() as u64;
        let max = self.jitter_max.as_millis() as u64;
        if max <= min {
            return self.jitter_min;
        }
        Duration::from_millis(rand::rng().random_range(min..max))
    }
}
