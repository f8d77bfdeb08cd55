//! Best-stories handlers.

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::response::{Redirect, Response};

use crate::state::AppState;
use crate::web::error::ApiError;
use crate::web::routes::{cache, with_cache_control};

/// Largest `n` accepted by `GET /best-stories/{n}`; the upstream ranking holds ~500 ids.
pub const MAX_STORIES: i64 = 500;

/// `n` used by the redirecting entry points.
pub const DEFAULT_STORIES: i64 = 10;

/// Validate a caller-supplied story count.
pub fn validate_count(n: i64) -> Result<usize, ApiError> {
    if n <= 0 {
        return Err(ApiError::invalid_count("n must be > 0"));
    }
    if n > MAX_STORIES {
        return Err(ApiError::invalid_count(format!(
            "n must be <= {MAX_STORIES}"
        )));
    }
    Ok(n as usize)
}

/// `GET /best-stories/{n}`
pub(super) async fn best_stories(
    State(state): State<AppState>,
    n: Result<Path<i64>, PathRejection>,
) -> Result<Response, ApiError> {
    let Path(n) = n.map_err(|e| ApiError::invalid_count(e.body_text()))?;
    let n = validate_count(n)?;

    let stories = state.stories.get_top(n).await;
    Ok(with_cache_control(stories, cache::BEST_STORIES))
}

/// `GET /` and `GET /best-stories`
pub(super) async fn redirect_to_default() -> Redirect {
    Redirect::temporary(&format!("/best-stories/{DEFAULT_STORIES}"))
}
