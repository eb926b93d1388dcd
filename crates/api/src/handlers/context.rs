//! Handlers for switching the conversation context.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use sheetguard_events::event_types;
use sheetguard_events::ReviewEvent;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SwitchContext {
    pub context_id: String,
}

#[derive(Debug, Serialize)]
pub struct ContextInfo {
    pub context_id: String,
    pub has_snapshot: bool,
}

// ---------------------------------------------------------------------------
// GET /context
// ---------------------------------------------------------------------------

pub async fn get_context(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let mut workbench = state.workbench.lock().await;
    let has_snapshot = workbench.snapshot().is_some();
    Ok(Json(DataResponse {
        data: ContextInfo {
            context_id: workbench.context_id(),
            has_snapshot,
        },
    }))
}

// ---------------------------------------------------------------------------
// PUT /context
// ---------------------------------------------------------------------------

/// Switch to another context. The snapshot of the new context (if any) is
/// loaded on the next access.
pub async fn switch_context(
    State(state): State<AppState>,
    Json(input): Json<SwitchContext>,
) -> AppResult<impl IntoResponse> {
    let context_id = input.context_id.trim();
    if context_id.is_empty() {
        return Err(AppError::BadRequest("context_id must not be empty".into()));
    }

    let mut workbench = state.workbench.lock().await;
    state.context.set(context_id);
    let has_snapshot = workbench.snapshot().is_some();
    drop(workbench);

    tracing::info!(context_id, has_snapshot, "Context switched");
    state.publish(ReviewEvent::new(event_types::CONTEXT_SWITCHED));

    Ok(Json(DataResponse {
        data: ContextInfo {
            context_id: context_id.to_string(),
            has_snapshot,
        },
    }))
}
