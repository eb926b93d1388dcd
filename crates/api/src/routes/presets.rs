//! Preset routes, mounted at `/presets`.
//!
//! ```text
//! GET    /                          list_presets
//! POST   /                          create_preset
//! POST   /import                    import_preset
//! GET    /active                    get_active_preset
//! GET    /{id}                      get_preset
//! PUT    /{id}                      rename_preset
//! DELETE /{id}                      delete_preset
//! POST   /{id}/activate             activate_preset
//! POST   /{id}/duplicate            duplicate_preset
//! GET    /{id}/export               export_preset
//! POST   /{id}/rules                add_rule
//! PUT    /{id}/rules/{rule_id}      update_rule
//! DELETE /{id}/rules/{rule_id}      remove_rule
//! ```

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::presets;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(presets::list_presets).post(presets::create_preset))
        .route("/import", post(presets::import_preset))
        .route("/active", get(presets::get_active_preset))
        .route(
            "/{id}",
            get(presets::get_preset)
                .put(presets::rename_preset)
                .delete(presets::delete_preset),
        )
        .route("/{id}/activate", post(presets::activate_preset))
        .route("/{id}/duplicate", post(presets::duplicate_preset))
        .route("/{id}/export", get(presets::export_preset))
        .route("/{id}/rules", post(presets::add_rule))
        .route(
            "/{id}/rules/{rule_id}",
            put(presets::update_rule).delete(presets::remove_rule),
        )
}
