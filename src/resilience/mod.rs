//! Retry + circuit-breaker envelope applied to every upstream call.
//!
//! The two policies live in their own modules and know nothing about each
//! other. [`ResiliencePipeline`] composes them: every attempt asks the breaker
//! for a permit first, so an open breaker short-circuits before any retry is
//! scheduled, and every attempt's outcome feeds the breaker.

pub mod breaker;
pub mod retry;

pub use breaker::{BreakerConfig, BreakerSnapshot, CircuitBreaker, CircuitState};
pub use retry::RetryPolicy;

use crate::hn::UpstreamError;
use crate::utils::fmt_duration;
use std::future::Future;
use std::time::Duration;
use tokio::time;
use tracing::{debug, trace};

pub struct ResiliencePipeline {
    retry: RetryPolicy,
    breaker: CircuitBreaker,
    attempt_timeout: Duration,
}

impl ResiliencePipeline {
    pub fn new(retry: RetryPolicy, breaker: BreakerConfig, attempt_timeout: Duration) -> Self {
        Self {
            retry,
            breaker: CircuitBreaker::new(breaker),
            attempt_timeout,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Run `call` until it succeeds, fails non-transiently, exhausts the retry
    /// budget, or the breaker refuses an attempt.
    ///
    /// Each attempt is bounded by the attempt timeout; expiry counts as a
    /// transient [`UpstreamError::Timeout`].
    pub async fn execute<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, UpstreamError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let mut retries = 0;
        loop {
            let permit = match self.breaker.try_acquire() {
                Ok(permit) => permit,
                Err(remaining) => {
                    trace!(
                        operation,
                        retry_in = fmt_duration(remaining),
                        "circuit open, skipping upstream call"
                    );
                    return Err(UpstreamError::CircuitOpen);
                }
            };

            let outcome = match time::timeout(self.attempt_timeout, call()).await {
                Ok(result) => result,
                Err(_elapsed) => Err(UpstreamError::Timeout(self.attempt_timeout)),
            };

            let err = match outcome {
                Ok(value) => {
                    permit.record_success();
                    return Ok(value);
                }
                Err(err) => err,
            };

            if err.trips_breaker() {
                permit.record_failure();
            } else {
                // The upstream answered; as far as its health goes, that is a success.
                permit.record_success();
            }

            if !self.retry.should_retry(&err, retries) {
                return Err(err);
            }

            retries += 1;
            let delay = self.retry.backoff(retries);
            debug!(
                operation,
                retry = retries,
                delay = fmt_duration(delay),
                error = %err,
                "transient upstream failure, retrying"
            );
            time::sleep(delay).await;
        }
    }
}
