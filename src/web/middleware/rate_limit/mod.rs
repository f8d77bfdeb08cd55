//! Inbound HTTP rate limiting with per-IP token buckets and a bounded wait queue.
//!
//! Each client IP gets `permits` requests per `window`. A request over budget
//! joins a process-wide wait queue (at most `queue_limit` waiters) and is
//! admitted as soon as its bucket refills. When the queue is full, or the wait
//! would outlast one window, the request is rejected with 429 + `Retry-After`.

use crate::web::error::{ApiError, ApiErrorCode};
use crate::web::middleware::client_ip::resolve_client_ip;
use axum::body::Body;
use axum::extract::Request;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter, clock::Clock};
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;
use tower::{Layer, Service};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub permits: u32,
    pub window: Duration,
    pub queue_limit: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            permits: 30,
            window: Duration::from_secs(10),
            queue_limit: 50,
        }
    }
}

/// Quota helper: `count` requests per `period` with burst = count.
fn quota(count: u32, period: Duration) -> Quota {
    let count = NonZeroU32::new(count).unwrap_or(NonZeroU32::MIN);
    let per_cell = (period / count.get()).max(Duration::from_nanos(1));
    Quota::with_period(per_cell)
        .unwrap_or_else(|| Quota::per_second(count))
        .allow_burst(count)
}

pub struct RateLimitState {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
    window: Duration,
    queue_limit: usize,
    queued: AtomicUsize,
}

/// Queue slot held while a request waits for its bucket; released on drop.
struct QueueSlot<'a>(&'a AtomicUsize);

impl Drop for QueueSlot<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl RateLimitState {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            limiter: RateLimiter::keyed(quota(config.permits, config.window)),
            window: config.window,
            queue_limit: config.queue_limit,
            queued: AtomicUsize::new(0),
        }
    }

    /// Number of requests currently parked in the wait queue.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    fn try_enqueue(&self) -> Option<QueueSlot<'_>> {
        self.queued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.queue_limit).then_some(n + 1)
            })
            .ok()
            .map(|_| QueueSlot(&self.queued))
    }

    /// Admit a request from `ip`, waiting in the queue if over budget.
    /// Returns `Err(retry_after_secs)` on rejection.
    pub async fn admit(&self, ip: IpAddr) -> Result<(), u64> {
        let wait = match self.limiter.check_key(&ip) {
            Ok(()) => return Ok(()),
            Err(not_until) => {
                not_until.wait_time_from(governor::clock::DefaultClock::default().now())
            }
        };
        let retry_after = wait.as_secs().max(1);

        if wait > self.window {
            return Err(retry_after);
        }

        let Some(_slot) = self.try_enqueue() else {
            return Err(retry_after);
        };

        debug!(client_ip = %ip, wait_ms = wait.as_millis() as u64, "Request queued by rate limiter");
        // Other waiters on the same key can push readiness past the first estimate.
        let deadline = wait + self.window;
        match tokio::time::timeout(deadline, self.limiter.until_key_ready(&ip)).await {
            Ok(()) => Ok(()),
            Err(_) => Err(retry_after),
        }
    }
}

pub type SharedRateLimitState = Arc<RateLimitState>;

// -- Tower Layer + Service --

#[derive(Clone)]
pub struct RateLimitLayer {
    state: SharedRateLimitState,
}

impl RateLimitLayer {
    pub fn new(state: SharedRateLimitState) -> Self {
        Self { state }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            state: self.state.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    state: SharedRateLimitState,
}

impl<S, ResBody> Service<Request> for RateLimitService<S>
where
    S: Service<Request, Response = Response<ResBody>> + Send + Clone + 'static,
    S::Future: Send + 'static,
    S::Error: std::fmt::Debug + Send,
    ResBody: Send + 'static,
    Body: Into<ResBody>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let Some(ip) = resolve_client_ip(req.headers(), req.extensions()) else {
            // Cannot determine IP -- allow.
            return Box::pin(self.inner.call(req));
        };

        // The ready service is consumed below; leave a fresh clone in its place.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let state = self.state.clone();
        let path = req.uri().path().to_string();

        Box::pin(async move {
            match state.admit(ip).await {
                Ok(()) => inner.call(req).await,
                Err(retry_after) => {
                    warn!(
                        client_ip = %ip,
                        path = %path,
                        retry_after_secs = retry_after,
                        "Rate limit exceeded"
                    );
                    Ok(rate_limit_response(retry_after).map(Into::into))
                }
            }
        })
    }
}

fn rate_limit_response(retry_after: u64) -> Response<Body> {
    let mut response = ApiError::new(
        ApiErrorCode::RateLimited,
        format!("Too many requests. Retry after {retry_after} seconds."),
    )
    .into_response();
    response
        .headers_mut()
        .insert("retry-after", HeaderValue::from(retry_after));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;
    use tower::ServiceExt;

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([192, 0, 2, last])
    }

    fn state(permits: u32, window: Duration, queue_limit: usize) -> RateLimitState {
        RateLimitState::new(RateLimitConfig {
            permits,
            window,
            queue_limit,
        })
    }

    #[tokio::test]
    async fn admits_within_budget() {
        let limiter = state(3, Duration::from_secs(10), 0);
        for _ in 0..3 {
            assert!(limiter.admit(ip(1)).await.is_ok());
        }
        assert!(limiter.admit(ip(1)).await.is_err());
    }

    #[tokio::test]
    async fn budgets_are_per_ip() {
        let limiter = state(1, Duration::from_secs(10), 0);
        assert!(limiter.admit(ip(1)).await.is_ok());
        assert!(limiter.admit(ip(2)).await.is_ok());
        assert!(limiter.admit(ip(1)).await.is_err());
    }

    #[tokio::test]
    async fn rejection_reports_retry_after_at_least_one_second() {
        let limiter = state(1, Duration::from_millis(100), 0);
        limiter.admit(ip(1)).await.unwrap();
        assert_eq!(limiter.admit(ip(1)).await, Err(1));
    }

    #[tokio::test]
    async fn queued_request_is_admitted_after_refill() {
        let limiter = state(1, Duration::from_millis(50), 1);
        limiter.admit(ip(1)).await.unwrap();
        assert!(limiter.admit(ip(1)).await.is_ok());
        assert_eq!(limiter.queued(), 0);
    }

    #[tokio::test]
    async fn full_queue_rejects() {
        let limiter = Arc::new(state(1, Duration::from_millis(500), 1));
        limiter.admit(ip(1)).await.unwrap();

        let waiter = {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.admit(ip(1)).await })
        };
        while limiter.queued() == 0 {
            tokio::task::yield_now().await;
        }

        assert!(limiter.admit(ip(1)).await.is_err());
        assert!(waiter.await.unwrap().is_ok());
        assert_eq!(limiter.queued(), 0);
    }

    #[tokio::test]
    async fn layer_returns_429_with_retry_after() {
        let shared = Arc::new(state(1, Duration::from_secs(10), 0));
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(RateLimitLayer::new(shared));

        let request = || {
            Request::builder()
                .uri("/")
                .header("x-forwarded-for", "198.51.100.9")
                .body(Body::empty())
                .unwrap()
        };

        let first = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(request()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(second.headers().contains_key("retry-after"));
    }

    #[tokio::test]
    async fn unknown_client_passes_through() {
        let shared = Arc::new(state(1, Duration::from_secs(10), 0));
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(RateLimitLayer::new(shared));

        for _ in 0..3 {
            let resp = app
                .clone()
                .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
        }
    }
}
