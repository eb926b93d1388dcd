//! Handlers for the live table set and its snapshot.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use serde_json::json;

use sheetguard_core::review::UpdateOutcome;
use sheetguard_core::types::TableSet;
use sheetguard_events::{event_types, ReviewEvent};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SnapshotView {
    pub context_id: String,
    pub sheets: Option<TableSet>,
}

// ---------------------------------------------------------------------------
// GET /sheets
// ---------------------------------------------------------------------------

pub async fn get_live(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let workbench = state.workbench.lock().await;
    Ok(Json(DataResponse {
        data: workbench.live().clone(),
    }))
}

// ---------------------------------------------------------------------------
// PUT /sheets
// ---------------------------------------------------------------------------

/// Ingest a table set from the external generator.
///
/// Always answers 200 with the [`UpdateOutcome`]; a rollback is a normal
/// outcome, not a request error.
pub async fn ingest_update(
    State(state): State<AppState>,
    Json(tables): Json<TableSet>,
) -> AppResult<impl IntoResponse> {
    let outcome = state.workbench.lock().await.ingest_update(tables)?;

    let event = match &outcome {
        UpdateOutcome::Baselined => ReviewEvent::new(event_types::UPDATE_BASELINED),
        UpdateOutcome::RolledBack { violation } => {
            ReviewEvent::new(event_types::UPDATE_ROLLED_BACK).with_payload(json!({
                "rule_id": violation.rule_id,
                "table": violation.table,
                "message": violation.message,
            }))
        }
        UpdateOutcome::Staged { changes } => ReviewEvent::new(event_types::UPDATE_STAGED)
            .with_payload(json!({ "changes": changes.len() })),
        UpdateOutcome::Rejected => ReviewEvent::new(event_types::UPDATE_REJECTED),
    };
    state.publish(event);

    Ok(Json(DataResponse { data: outcome }))
}

// ---------------------------------------------------------------------------
// GET /snapshot
// ---------------------------------------------------------------------------

pub async fn get_snapshot(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let mut workbench = state.workbench.lock().await;
    let sheets = workbench.snapshot().cloned();
    Ok(Json(DataResponse {
        data: SnapshotView {
            context_id: workbench.context_id(),
            sheets,
        },
    }))
}
