//! Error types for the Hacker News API client.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("item not found upstream")]
    NotFound,
    #[error("upstream responded with status {0}")]
    Status(u16),
    #[error("upstream request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("upstream call timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to parse upstream response from {url}")]
    Parse {
        url: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("circuit breaker is open")]
    CircuitOpen,
}

impl UpstreamError {
    /// Map a transport error, folding reqwest's own timeout into [`UpstreamError::Timeout`].
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else {
            Self::Request(err)
        }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Network failures, timeouts, 5xx, 408 and 429 are retried. Not-found and
    /// malformed bodies are final for this resolution attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(_) | Self::Timeout(_) => true,
            Self::Status(code) => *code >= 500 || *code == 408 || *code == 429,
            Self::NotFound | Self::Parse { .. } | Self::CircuitOpen => false,
        }
    }

    /// Whether this failure counts toward opening the circuit breaker.
    ///
    /// Same as [`is_transient`](Self::is_transient) except that 429 is excluded:
    /// a rate-limited upstream is healthy, just busy.
    pub fn trips_breaker(&self) -> bool {
        match self {
            Self::Status(429) => false,
            other => other.is_transient(),
        }
    }
}
