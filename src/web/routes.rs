//! Web API router construction and shared response utilities.

use axum::{
    Router,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use std::time::Duration;
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer};

use crate::state::AppState;
use crate::web::error::{ApiError, ApiErrorCode};
use crate::web::middleware::rate_limit::{RateLimitLayer, SharedRateLimitState};
use crate::web::middleware::request_id::RequestIdLayer;
use crate::web::{status, stories};

/// Cache-Control presets for public endpoints.
pub mod cache {
    /// Best-stories listing; short enough to track the 30s upstream ranking refresh.
    pub const BEST_STORIES: &str = "public, max-age=15";
}

/// Wraps a JSON response with a `Cache-Control` header.
pub fn with_cache_control<T: serde::Serialize>(value: T, header: &'static str) -> Response {
    let mut response = Json(value).into_response();
    response.headers_mut().insert(
        axum::http::header::CACHE_CONTROL,
        HeaderValue::from_static(header),
    );
    response
}

/// Creates the web server router
pub fn create_router(
    app_state: AppState,
    rate_limit: SharedRateLimitState,
    request_timeout: Duration,
) -> Router {
    // Only the aggregation endpoint is metered; it is the one that costs upstream calls.
    let stories_router = Router::new()
        .route("/best-stories/{n}", get(stories::best_stories))
        .layer(RateLimitLayer::new(rate_limit));

    let router = Router::new()
        .route("/", get(stories::redirect_to_default))
        .route("/best-stories", get(stories::redirect_to_default))
        .route("/health", get(status::health))
        .route("/status", get(status::status))
        .merge(stories_router)
        .fallback(not_found)
        .with_state(app_state);

    router.layer((
        // Outermost: per-request ID span + severity-proportional response logging.
        RequestIdLayer,
        CompressionLayer::new()
            .br(true)
            .gzip(true)
            .quality(tower_http::CompressionLevel::Fastest),
        TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout),
    ))
}

async fn not_found() -> ApiError {
    ApiError::new(ApiErrorCode::NotFound, "No such route")
}
