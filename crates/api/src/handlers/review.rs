//! Handlers for the snapshot/diff review workflow.
//!
//! Every resolution answers with the changes still pending afterwards, so a
//! client can re-render without a second round trip.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use sheetguard_core::diff::Change;
use sheetguard_core::review::ChangeTarget;
use sheetguard_core::types::CellValue;
use sheetguard_core::validation::Violation;
use sheetguard_core::CoreError;
use sheetguard_events::{event_types, ReviewEvent};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ViolationReport {
    pub violations: Vec<Violation>,
    pub error_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionParams {
    pub rule_id: String,
    pub sheet_key: String,
    pub row_index: usize,
}

#[derive(Debug, Deserialize)]
pub struct ApplyFix {
    pub sheet_key: String,
    pub row_index: usize,
    pub col_index: usize,
    pub value: CellValue,
}

#[derive(Clone, Copy)]
enum Resolution {
    Accept,
    Reject,
    Restore,
}

impl Resolution {
    fn event_type(self) -> &'static str {
        match self {
            Self::Accept => event_types::CHANGE_ACCEPTED,
            Self::Reject => event_types::CHANGE_REJECTED,
            Self::Restore => event_types::CHANGE_RESTORED,
        }
    }
}

fn target_event(event_type: &str, target: &ChangeTarget) -> ReviewEvent {
    ReviewEvent::new(event_type)
        .with_sheet(target.sheet_key.clone())
        .with_payload(json!({
            "row_index": target.row_index,
            "col_index": target.col_index,
        }))
}

/// Apply one resolution and return the remaining changes.
async fn resolve(
    state: &AppState,
    resolution: Resolution,
    target: ChangeTarget,
) -> AppResult<Vec<Change>> {
    let mut workbench = state.workbench.lock().await;
    match resolution {
        Resolution::Accept => workbench.accept(&target)?,
        Resolution::Reject => workbench.reject(&target)?,
        Resolution::Restore => workbench.restore(&target)?,
    }
    let pending = workbench.pending_changes();
    drop(workbench);

    state.publish(target_event(resolution.event_type(), &target));
    Ok(pending)
}

// ---------------------------------------------------------------------------
// GET /review/changes
// ---------------------------------------------------------------------------

pub async fn list_changes(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let changes = state.workbench.lock().await.pending_changes();
    tracing::debug!(count = changes.len(), "Listed pending changes");
    Ok(Json(DataResponse { data: changes }))
}

// ---------------------------------------------------------------------------
// POST /review/accept | /review/reject | /review/restore
// ---------------------------------------------------------------------------

pub async fn accept_change(
    State(state): State<AppState>,
    Json(target): Json<ChangeTarget>,
) -> AppResult<impl IntoResponse> {
    let pending = resolve(&state, Resolution::Accept, target).await?;
    Ok(Json(DataResponse { data: pending }))
}

pub async fn reject_change(
    State(state): State<AppState>,
    Json(target): Json<ChangeTarget>,
) -> AppResult<impl IntoResponse> {
    let pending = resolve(&state, Resolution::Reject, target).await?;
    Ok(Json(DataResponse { data: pending }))
}

pub async fn restore_change(
    State(state): State<AppState>,
    Json(target): Json<ChangeTarget>,
) -> AppResult<impl IntoResponse> {
    let pending = resolve(&state, Resolution::Restore, target).await?;
    Ok(Json(DataResponse { data: pending }))
}

// ---------------------------------------------------------------------------
// POST /review/accept-all | /review/reject-all
// ---------------------------------------------------------------------------

pub async fn accept_all(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let pending = {
        let mut workbench = state.workbench.lock().await;
        workbench.accept_all()?;
        workbench.pending_changes()
    };
    state.publish(ReviewEvent::new(event_types::CHANGES_ACCEPTED_ALL));
    Ok(Json(DataResponse { data: pending }))
}

pub async fn reject_all(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let pending = {
        let mut workbench = state.workbench.lock().await;
        workbench.reject_all()?;
        workbench.pending_changes()
    };
    state.publish(ReviewEvent::new(event_types::CHANGES_REJECTED_ALL));
    Ok(Json(DataResponse { data: pending }))
}

// ---------------------------------------------------------------------------
// GET /review/violations
// ---------------------------------------------------------------------------

pub async fn list_violations(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let violations = state.workbench.lock().await.violations();
    let error_count = sheetguard_core::validation::error_count(&violations);
    Ok(Json(DataResponse {
        data: ViolationReport {
            violations,
            error_count,
        },
    }))
}

// ---------------------------------------------------------------------------
// POST /review/violations/revert
// ---------------------------------------------------------------------------

pub async fn revert_violation(
    State(state): State<AppState>,
    Json(violation): Json<Violation>,
) -> AppResult<impl IntoResponse> {
    let target = state.workbench.lock().await.revert_violation(&violation)?;
    tracing::info!(rule_id = %violation.rule_id, sheet_key = %target.sheet_key, "Violation reverted");
    state.publish(target_event(event_types::VIOLATION_REVERTED, &target));
    Ok(Json(DataResponse { data: target }))
}

// ---------------------------------------------------------------------------
// GET /review/suggestions
// ---------------------------------------------------------------------------

pub async fn suggest_fixes(
    State(state): State<AppState>,
    Query(params): Query<SuggestionParams>,
) -> AppResult<impl IntoResponse> {
    let options = state.workbench.lock().await.suggest_fixes(
        &params.rule_id,
        &params.sheet_key,
        params.row_index,
    )?;
    Ok(Json(DataResponse { data: options }))
}

// ---------------------------------------------------------------------------
// POST /review/fix
// ---------------------------------------------------------------------------

pub async fn apply_fix(
    State(state): State<AppState>,
    Json(input): Json<ApplyFix>,
) -> AppResult<impl IntoResponse> {
    if input.value.is_array() || input.value.is_object() {
        return Err(CoreError::Validation("A cell value must be a string, number or null".into()).into());
    }
    let target = ChangeTarget::cell(input.sheet_key, input.row_index, input.col_index);
    state.workbench.lock().await.apply_fix(&target, input.value)?;
    state.publish(target_event(event_types::FIX_APPLIED, &target));
    Ok(Json(DataResponse { data: target }))
}
