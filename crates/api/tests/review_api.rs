//! HTTP-level integration tests for updates, the review workflow and
//! context switching.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get, post_json, put_json, valid_tables};
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `valid_tables()` with Bob renamed.
fn renamed_bob(name: &str) -> Value {
    let mut tables = valid_tables();
    tables["sheet_1"]["content"][2][1] = json!(name);
    tables
}

async fn ingest(app: &axum::Router, tables: Value) -> Value {
    let response = put_json(app.clone(), "/api/v1/sheets", tables).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["data"].clone()
}

// ---------------------------------------------------------------------------
// Test: first update becomes the baseline, later ones are staged
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_update_is_baselined_then_changes_are_staged() {
    let app = build_test_app();

    let outcome = ingest(&app, valid_tables()).await;
    assert_eq!(outcome["outcome"], "baselined");

    let snapshot = body_json(get(app.clone(), "/api/v1/snapshot").await).await;
    assert_eq!(snapshot["data"]["context_id"], "chat-A");
    assert_eq!(snapshot["data"]["sheets"], valid_tables());

    let outcome = ingest(&app, renamed_bob("Robert")).await;
    assert_eq!(outcome["outcome"], "staged");
    let changes = outcome["changes"].as_array().unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0]["kind"], "cell_modified");
    assert_eq!(changes[0]["sheet_key"], "sheet_1");
    assert_eq!(changes[0]["row_index"], 2);
    assert_eq!(changes[0]["col_index"], 1);
    assert_eq!(changes[0]["old_value"], "Bob");
    assert_eq!(changes[0]["new_value"], "Robert");

    let listed = body_json(get(app, "/api/v1/review/changes").await).await;
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Test: accepting a cell moves it into the snapshot
// ---------------------------------------------------------------------------

#[tokio::test]
async fn accept_cell_updates_snapshot() {
    let app = build_test_app();
    ingest(&app, valid_tables()).await;
    ingest(&app, renamed_bob("Robert")).await;

    let response = post_json(
        app.clone(),
        "/api/v1/review/accept",
        json!({ "sheet_key": "sheet_1", "row_index": 2, "col_index": 1 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await["data"].as_array().unwrap().is_empty());

    let snapshot = body_json(get(app, "/api/v1/snapshot").await).await;
    assert_eq!(snapshot["data"]["sheets"]["sheet_1"]["content"][2][1], "Robert");
}

// ---------------------------------------------------------------------------
// Test: accept-all and reject-all clear the pending list
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bulk_resolution_clears_pending_changes() {
    let app = build_test_app();
    ingest(&app, valid_tables()).await;

    ingest(&app, renamed_bob("Robert")).await;
    let response = post_json(app.clone(), "/api/v1/review/accept-all", json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await["data"].as_array().unwrap().is_empty());

    ingest(&app, renamed_bob("Bobby")).await;
    let response = post_json(app.clone(), "/api/v1/review/reject-all", json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await["data"].as_array().unwrap().is_empty());

    let live = body_json(get(app, "/api/v1/sheets").await).await;
    assert_eq!(live["data"]["sheet_1"]["content"][2][1], "Robert");
}

// ---------------------------------------------------------------------------
// Test: resolving the header row is rejected
// ---------------------------------------------------------------------------

#[tokio::test]
async fn header_row_cannot_be_resolved() {
    let app = build_test_app();
    ingest(&app, valid_tables()).await;

    let response = post_json(
        app,
        "/api/v1/review/reject",
        json!({ "sheet_key": "sheet_1", "row_index": 0 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

// ---------------------------------------------------------------------------
// Test: resolution without a snapshot is a conflict
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reject_all_without_snapshot_conflicts() {
    let app = build_test_app();
    let response = post_json(app, "/api/v1/review/reject-all", json!({})).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

// ---------------------------------------------------------------------------
// Test: an intercept rule rolls the update back
// ---------------------------------------------------------------------------

#[tokio::test]
async fn intercept_rule_rolls_back_update() {
    let app = build_test_app();
    ingest(&app, valid_tables()).await;

    let response = put_json(
        app.clone(),
        "/api/v1/rules/builtin-global-single-row/intercept",
        json!({ "intercept": true }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut two_rows = valid_tables();
    two_rows["sheet_0"]["content"]
        .as_array_mut()
        .unwrap()
        .push(json!([1, 2, "rain"]));
    let outcome = ingest(&app, two_rows).await;
    assert_eq!(outcome["outcome"], "rolled_back");
    assert_eq!(outcome["violation"]["rule_id"], "builtin-global-single-row");
    assert_eq!(outcome["violation"]["row_index"], -1);

    let live = body_json(get(app.clone(), "/api/v1/sheets").await).await;
    assert_eq!(live["data"], valid_tables());

    let health = body_json(get(app.clone(), "/health").await).await;
    assert_eq!(health["idle"], true);

    // The next valid update is processed normally.
    let outcome = ingest(&app, renamed_bob("Robert")).await;
    assert_eq!(outcome["outcome"], "staged");
}

// ---------------------------------------------------------------------------
// Test: violations, suggestions and fixes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn violations_are_reported_and_fixed() {
    let app = build_test_app();
    ingest(&app, valid_tables()).await;
    ingest(&app, renamed_bob("")).await;

    let report = body_json(get(app.clone(), "/api/v1/review/violations").await).await;
    assert_eq!(report["data"]["error_count"], 1);
    let violation = &report["data"]["violations"][0];
    assert_eq!(violation["rule_id"], "builtin-character-name-required");
    assert_eq!(violation["table"], "Characters");
    assert_eq!(violation["row_index"], 2);

    let response = post_json(
        app.clone(),
        "/api/v1/review/fix",
        json!({ "sheet_key": "sheet_1", "row_index": 2, "col_index": 1, "value": "Bob" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let report = body_json(get(app, "/api/v1/review/violations").await).await;
    assert_eq!(report["data"]["error_count"], 0);
}

#[tokio::test]
async fn revert_violation_restores_snapshot_value() {
    let app = build_test_app();
    ingest(&app, valid_tables()).await;
    ingest(&app, renamed_bob("")).await;

    let report = body_json(get(app.clone(), "/api/v1/review/violations").await).await;
    let violation = report["data"]["violations"][0].clone();

    let response = post_json(app.clone(), "/api/v1/review/violations/revert", violation).await;
    assert_eq!(response.status(), StatusCode::OK);
    let target = body_json(response).await;
    assert_eq!(target["data"]["sheet_key"], "sheet_1");
    assert_eq!(target["data"]["row_index"], 2);

    let live = body_json(get(app, "/api/v1/sheets").await).await;
    assert_eq!(live["data"]["sheet_1"]["content"][2][1], "Bob");
}

#[tokio::test]
async fn suggestions_rank_enum_values() {
    let app = build_test_app();
    let mut tables = valid_tables();
    tables["sheet_2"]["content"][1][2] = json!("don");
    ingest(&app, tables).await;

    let response = get(
        app.clone(),
        "/api/v1/review/suggestions?rule_id=builtin-task-status&sheet_key=sheet_2&row_index=1",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let options = body_json(response).await;
    assert_eq!(options["data"]["kind"], "choice");
    assert_eq!(options["data"]["suggestions"][0], "done");

    let response = get(
        app,
        "/api/v1/review/suggestions?rule_id=ghost&sheet_key=sheet_2&row_index=1",
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn fix_rejects_structured_values() {
    let app = build_test_app();
    ingest(&app, valid_tables()).await;

    let response = post_json(
        app,
        "/api/v1/review/fix",
        json!({ "sheet_key": "sheet_1", "row_index": 1, "col_index": 1, "value": [1, 2] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Test: snapshots are isolated per context
// ---------------------------------------------------------------------------

#[tokio::test]
async fn switching_context_hides_foreign_snapshot() {
    let app = build_test_app();
    ingest(&app, valid_tables()).await;

    let response = put_json(app.clone(), "/api/v1/context", json!({ "context_id": "chat-B" })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let info = body_json(response).await;
    assert_eq!(info["data"]["context_id"], "chat-B");
    assert_eq!(info["data"]["has_snapshot"], false);

    let snapshot = body_json(get(app.clone(), "/api/v1/snapshot").await).await;
    assert!(snapshot["data"]["sheets"].is_null());

    // First update in the new context becomes its baseline.
    let outcome = ingest(&app, renamed_bob("Robert")).await;
    assert_eq!(outcome["outcome"], "baselined");

    let response = put_json(app.clone(), "/api/v1/context", json!({ "context_id": "  " })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let info = body_json(get(app, "/api/v1/context").await).await;
    assert_eq!(info["data"]["context_id"], "chat-B");
    assert_eq!(info["data"]["has_snapshot"], true);
}
