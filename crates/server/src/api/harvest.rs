//! Harvest control handlers.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use harvester_core::HarvestStatus;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::state::AppState;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Simple message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Current harvest status snapshot.
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<HarvestStatus> {
    Json(state.orchestrator().status().await)
}

/// Request a graceful stop of the running harvest.
///
/// In-flight fetches settle (bounded by the per-fetch timeout), buffered
/// records are flushed and progress is saved before the run returns.
pub async fn stop(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let orchestrator = state.orchestrator();
    if !orchestrator.is_running() {
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "No harvest is running".to_string(),
            }),
        )
            .into_response();
    }

    info!("Stop requested over HTTP");
    orchestrator.stop();
    (
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: "Stop requested".to_string(),
        }),
    )
        .into_response()
}
