//! HTTP-level integration tests for the `/rules` API endpoints.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, delete, get, put_json};
use serde_json::json;

// ---------------------------------------------------------------------------
// Test: effective rules start enabled with stored intercept flags
// ---------------------------------------------------------------------------

#[tokio::test]
async fn effective_rules_default_to_enabled() {
    let app = build_test_app();
    let json = body_json(get(app, "/api/v1/rules").await).await;
    let rules = json["data"].as_array().unwrap();
    assert_eq!(rules.len(), 6);
    assert!(rules.iter().all(|r| r["enabled"] == true));
    assert!(rules.iter().all(|r| r["intercept"] == false));
    assert!(rules.iter().all(|r| r["config"]["type"].is_string()));
}

// ---------------------------------------------------------------------------
// Test: disabling a rule hides it from the table view, reset restores it
// ---------------------------------------------------------------------------

#[tokio::test]
async fn enable_override_and_reset() {
    let app = build_test_app();

    let before = body_json(get(app.clone(), "/api/v1/rules/table/Characters").await).await;
    assert_eq!(before["data"].as_array().unwrap().len(), 2);

    let response = put_json(
        app.clone(),
        "/api/v1/rules/builtin-character-name-required/enabled",
        json!({ "enabled": false }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["enabled"], false);

    let after = body_json(get(app.clone(), "/api/v1/rules/table/Characters").await).await;
    let remaining = after["data"].as_array().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["id"], "builtin-character-attributes");

    let all = body_json(get(app.clone(), "/api/v1/rules").await).await;
    let disabled = all["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["id"] == "builtin-character-name-required")
        .unwrap()
        .clone();
    assert_eq!(disabled["enabled"], false);

    let response = delete(app.clone(), "/api/v1/rules/overrides").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let reset = body_json(get(app, "/api/v1/rules/table/Characters").await).await;
    assert_eq!(reset["data"].as_array().unwrap().len(), 2);
}

// ---------------------------------------------------------------------------
// Test: intercept override shows up on the effective rule
// ---------------------------------------------------------------------------

#[tokio::test]
async fn intercept_override_is_reflected() {
    let app = build_test_app();
    let response = put_json(
        app.clone(),
        "/api/v1/rules/builtin-task-status/intercept",
        json!({ "intercept": true }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(get(app, "/api/v1/rules/table/Tasks").await).await;
    assert_eq!(json["data"][0]["intercept"], true);
}

// ---------------------------------------------------------------------------
// Test: overrides for unknown rules are rejected
// ---------------------------------------------------------------------------

#[tokio::test]
async fn override_for_unknown_rule_returns_404() {
    let app = build_test_app();
    let response = put_json(app, "/api/v1/rules/ghost/enabled", json!({ "enabled": true })).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}
