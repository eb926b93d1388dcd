use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Context the engine is currently serving.
    pub context_id: String,
    /// Whether the review controller is idle.
    pub idle: bool,
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let workbench = state.workbench.lock().await;
    let idle = workbench.phase() == sheetguard_core::review::ReviewPhase::Idle;

    Json(HealthResponse {
        status: if idle { "ok" } else { "busy" },
        version: env!("CARGO_PKG_VERSION"),
        context_id: workbench.context_id(),
        idle,
    })
}

/// Mount health check routes (root level, not under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
