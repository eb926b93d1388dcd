//! Handlers for effective rules and per-rule overrides.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use sheetguard_events::{event_types, ReviewEvent};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SetEnabled {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetIntercept {
    pub intercept: bool,
}

// ---------------------------------------------------------------------------
// GET /rules
// ---------------------------------------------------------------------------

/// Active preset's rules with overrides applied.
pub async fn list_effective_rules(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let rules = state.workbench.lock().await.effective_rules();
    Ok(Json(DataResponse { data: rules }))
}

// ---------------------------------------------------------------------------
// GET /rules/table/{name}
// ---------------------------------------------------------------------------

pub async fn rules_for_table(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<impl IntoResponse> {
    let rules = state.workbench.lock().await.rules_for_table(&name);
    Ok(Json(DataResponse { data: rules }))
}

// ---------------------------------------------------------------------------
// PUT /rules/{id}/enabled | /rules/{id}/intercept
// ---------------------------------------------------------------------------

pub async fn set_enabled(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<SetEnabled>,
) -> AppResult<impl IntoResponse> {
    state
        .workbench
        .lock()
        .await
        .set_rule_enabled(&id, input.enabled)?;
    state.publish(
        ReviewEvent::new(event_types::RULE_OVERRIDE_CHANGED)
            .with_payload(json!({ "rule_id": id, "enabled": input.enabled })),
    );
    Ok(Json(DataResponse {
        data: json!({ "rule_id": id, "enabled": input.enabled }),
    }))
}

pub async fn set_intercept(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<SetIntercept>,
) -> AppResult<impl IntoResponse> {
    state
        .workbench
        .lock()
        .await
        .set_rule_intercept(&id, input.intercept)?;
    state.publish(
        ReviewEvent::new(event_types::RULE_OVERRIDE_CHANGED)
            .with_payload(json!({ "rule_id": id, "intercept": input.intercept })),
    );
    Ok(Json(DataResponse {
        data: json!({ "rule_id": id, "intercept": input.intercept }),
    }))
}

// ---------------------------------------------------------------------------
// DELETE /rules/overrides
// ---------------------------------------------------------------------------

pub async fn reset_overrides(State(state): State<AppState>) -> AppResult<StatusCode> {
    state.workbench.lock().await.reset_overrides()?;
    state.publish(ReviewEvent::new(event_types::RULE_OVERRIDE_CHANGED).with_payload(json!({ "reset": true })));
    Ok(StatusCode::NO_CONTENT)
}
