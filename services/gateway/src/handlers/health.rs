use axum::{Json, extract::State};
use stream_engine::MetricsSnapshot;

use crate::models::HealthResponse;
use crate::state::AppState;

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: stream_engine::SERVICE_VERSION.to_string(),
    })
}

/// `GET /v1/stats`: pipeline counters.
pub async fn stats(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
