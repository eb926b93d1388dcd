//! Context routes, mounted at `/context`.
//!
//! ```text
//! GET    /        get_context
//! PUT    /        switch_context
//! ```

use axum::routing::get;
use axum::Router;

use crate::handlers::context;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(context::get_context).put(context::switch_context))
}
