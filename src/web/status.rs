//! Health and status handlers.

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::trace;

use crate::resilience::CircuitState;
use crate::state::AppState;
use crate::stories::AggregatorStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Active,
    /// Upstream circuit is open or probing; responses may be partial.
    Degraded,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    status: OverallStatus,
    version: String,
    commit: String,
    uptime_secs: u64,
    aggregator: AggregatorStats,
}

/// Health check endpoint
pub(super) async fn health() -> Json<Value> {
    trace!("health check requested");
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Status endpoint showing upstream circuit and cache state
pub(super) async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let aggregator = state.stories.stats();
    let status = match aggregator.upstream.state {
        CircuitState::Closed => OverallStatus::Active,
        CircuitState::Open | CircuitState::HalfOpen => OverallStatus::Degraded,
    };

    Json(StatusResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: env!("GIT_COMMIT_HASH").to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        aggregator,
    })
}
