//! Handlers for preset management and preset rule editing.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use sheetguard_core::preset::{Preset, PresetExport};
use sheetguard_core::validation::Rule;
use sheetguard_core::CoreError;
use sheetguard_events::{event_types, ReviewEvent};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Body for create, rename and duplicate.
#[derive(Debug, Deserialize)]
pub struct PresetName {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct PresetList {
    pub active_id: String,
    pub presets: Vec<Preset>,
}

fn changed(state: &AppState, preset_id: &str) {
    state.publish(
        ReviewEvent::new(event_types::PRESET_CHANGED).with_payload(json!({ "preset_id": preset_id })),
    );
}

// ---------------------------------------------------------------------------
// GET /presets
// ---------------------------------------------------------------------------

pub async fn list_presets(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let workbench = state.workbench.lock().await;
    let presets = workbench.presets();
    tracing::debug!(count = presets.presets().len(), "Listed presets");
    Ok(Json(DataResponse {
        data: PresetList {
            active_id: presets.active_id().to_string(),
            presets: presets.presets().to_vec(),
        },
    }))
}

// ---------------------------------------------------------------------------
// POST /presets
// ---------------------------------------------------------------------------

pub async fn create_preset(
    State(state): State<AppState>,
    Json(input): Json<PresetName>,
) -> AppResult<impl IntoResponse> {
    let created = state.workbench.lock().await.create_preset(&input.name)?;
    tracing::info!(id = %created.id, name = %created.name, "Preset created");
    changed(&state, &created.id);
    Ok((StatusCode::CREATED, Json(DataResponse { data: created })))
}

// ---------------------------------------------------------------------------
// POST /presets/import
// ---------------------------------------------------------------------------

pub async fn import_preset(
    State(state): State<AppState>,
    Json(input): Json<PresetExport>,
) -> AppResult<impl IntoResponse> {
    let imported = state.workbench.lock().await.import_preset(input)?;
    tracing::info!(id = %imported.id, rules = imported.rules.len(), "Preset imported");
    changed(&state, &imported.id);
    Ok((StatusCode::CREATED, Json(DataResponse { data: imported })))
}

// ---------------------------------------------------------------------------
// GET /presets/active
// ---------------------------------------------------------------------------

pub async fn get_active_preset(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let preset = state.workbench.lock().await.active_preset().clone();
    Ok(Json(DataResponse { data: preset }))
}

// ---------------------------------------------------------------------------
// GET /presets/{id}
// ---------------------------------------------------------------------------

pub async fn get_preset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let preset = state
        .workbench
        .lock()
        .await
        .presets()
        .get(&id)
        .cloned()
        .ok_or_else(|| CoreError::not_found("Preset", &id))?;
    Ok(Json(DataResponse { data: preset }))
}

// ---------------------------------------------------------------------------
// PUT /presets/{id}
// ---------------------------------------------------------------------------

pub async fn rename_preset(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<PresetName>,
) -> AppResult<impl IntoResponse> {
    let renamed = state.workbench.lock().await.rename_preset(&id, &input.name)?;
    tracing::info!(id = %renamed.id, name = %renamed.name, "Preset renamed");
    changed(&state, &renamed.id);
    Ok(Json(DataResponse { data: renamed }))
}

// ---------------------------------------------------------------------------
// DELETE /presets/{id}
// ---------------------------------------------------------------------------

pub async fn delete_preset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.workbench.lock().await.delete_preset(&id)?;
    tracing::info!(id = %id, "Preset deleted");
    state.publish(
        ReviewEvent::new(event_types::PRESET_DELETED).with_payload(json!({ "preset_id": id })),
    );
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// POST /presets/{id}/activate
// ---------------------------------------------------------------------------

pub async fn activate_preset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let activated = state.workbench.lock().await.set_active_preset(&id)?;
    if !activated {
        return Err(CoreError::not_found("Preset", id).into());
    }
    state.publish(
        ReviewEvent::new(event_types::PRESET_ACTIVATED).with_payload(json!({ "preset_id": id })),
    );
    Ok(Json(DataResponse {
        data: json!({ "active_id": id }),
    }))
}

// ---------------------------------------------------------------------------
// POST /presets/{id}/duplicate
// ---------------------------------------------------------------------------

pub async fn duplicate_preset(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<PresetName>,
) -> AppResult<impl IntoResponse> {
    let copy = state
        .workbench
        .lock()
        .await
        .duplicate_preset(&id, &input.name)?;
    tracing::info!(source = %id, id = %copy.id, "Preset duplicated");
    changed(&state, &copy.id);
    Ok((StatusCode::CREATED, Json(DataResponse { data: copy })))
}

// ---------------------------------------------------------------------------
// GET /presets/{id}/export
// ---------------------------------------------------------------------------

pub async fn export_preset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let export = state.workbench.lock().await.export_preset(&id)?;
    Ok(Json(DataResponse { data: export }))
}

// ---------------------------------------------------------------------------
// POST /presets/{id}/rules
// ---------------------------------------------------------------------------

pub async fn add_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(rule): Json<Rule>,
) -> AppResult<impl IntoResponse> {
    let added = state.workbench.lock().await.add_rule(&id, rule)?;
    tracing::info!(preset_id = %id, rule_id = %added.id, kind = %added.kind(), "Rule added");
    changed(&state, &id);
    Ok((StatusCode::CREATED, Json(DataResponse { data: added })))
}

// ---------------------------------------------------------------------------
// PUT /presets/{id}/rules/{rule_id}
// ---------------------------------------------------------------------------

pub async fn update_rule(
    State(state): State<AppState>,
    Path((id, rule_id)): Path<(String, String)>,
    Json(rule): Json<Rule>,
) -> AppResult<impl IntoResponse> {
    let updated = state
        .workbench
        .lock()
        .await
        .update_rule(&id, &rule_id, rule)?;
    tracing::info!(preset_id = %id, rule_id = %rule_id, "Rule updated");
    changed(&state, &id);
    Ok(Json(DataResponse { data: updated }))
}

// ---------------------------------------------------------------------------
// DELETE /presets/{id}/rules/{rule_id}
// ---------------------------------------------------------------------------

pub async fn remove_rule(
    State(state): State<AppState>,
    Path((id, rule_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    state.workbench.lock().await.remove_rule(&id, &rule_id)?;
    tracing::info!(preset_id = %id, rule_id = %rule_id, "Rule removed");
    changed(&state, &id);
    Ok(StatusCode::NO_CONTENT)
}
