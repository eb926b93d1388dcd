//! Effective rule and override routes, mounted at `/rules`.
//!
//! ```text
//! GET    /                    list_effective_rules
//! DELETE /overrides           reset_overrides
//! GET    /table/{name}        rules_for_table
//! PUT    /{id}/enabled        set_enabled
//! PUT    /{id}/intercept      set_intercept
//! ```

use axum::routing::{delete, get, put};
use axum::Router;

use crate::handlers::rules;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(rules::list_effective_rules))
        .route("/overrides", delete(rules::reset_overrides))
        .route("/table/{name}", get(rules::rules_for_table))
        .route("/{id}/enabled", put(rules::set_enabled))
        .route("/{id}/intercept", put(rules::set_intercept))
}
