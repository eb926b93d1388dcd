//! Review workflow routes, mounted at `/review`.
//!
//! ```text
//! GET    /changes                 list_changes
//! POST   /accept                  accept_change
//! POST   /reject                  reject_change
//! POST   /restore                 restore_change
//! POST   /accept-all              accept_all
//! POST   /reject-all              reject_all
//! GET    /violations              list_violations
//! POST   /violations/revert       revert_violation
//! GET    /suggestions             suggest_fixes
//! POST   /fix                     apply_fix
//! ```

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::review;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/changes", get(review::list_changes))
        .route("/accept", post(review::accept_change))
        .route("/reject", post(review::reject_change))
        .route("/restore", post(review::restore_change))
        .route("/accept-all", post(review::accept_all))
        .route("/reject-all", post(review::reject_all))
        .route("/violations", get(review::list_violations))
        .route("/violations/revert", post(review::revert_violation))
        .route("/suggestions", get(review::suggest_fixes))
        .route("/fix", post(review::apply_fix))
}
