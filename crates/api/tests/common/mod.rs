#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use sheetguard_api::config::ServerConfig;
use sheetguard_api::router::build_app_router;
use sheetguard_api::state::AppState;
use sheetguard_core::store::MemoryStore;
use sheetguard_events::EventBus;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        data_dir: PathBuf::from("./unused"),
        default_context_id: "chat-A".to_string(),
    }
}

/// Build the full application router over an in-memory store.
///
/// Clones of the returned router share one engine, so a test can send a
/// sequence of requests with `app.clone()`.
pub fn build_test_app() -> Router {
    let config = test_config();
    let state = AppState::new(
        Box::new(MemoryStore::new()),
        config.clone(),
        Arc::new(EventBus::default()),
    );
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn put_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(body)).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A small table set that passes every built-in rule.
pub fn valid_tables() -> Value {
    json!({
        "sheet_0": {
            "name": "Global",
            "content": [[null, "Day", "Weather"], [0, 1, "sunny"]]
        },
        "sheet_1": {
            "name": "Characters",
            "content": [
                [null, "Name", "Attributes"],
                [0, "Alice", "Strength:80;Agility:70"],
                [1, "Bob", "Strength:40"]
            ]
        },
        "sheet_2": {
            "name": "Tasks",
            "content": [[null, "Title", "Status"], [0, "Find the key", "pending"]]
        }
    })
}
