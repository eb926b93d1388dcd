//! Table set routes, merged at the `/api/v1` root.
//!
//! ```text
//! GET    /sheets      get_live
//! PUT    /sheets      ingest_update
//! GET    /snapshot    get_snapshot
//! ```

use axum::routing::get;
use axum::Router;

use crate::handlers::sheets;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sheets", get(sheets::get_live).put(sheets::ingest_update))
        .route("/snapshot", get(sheets::get_snapshot))
}
