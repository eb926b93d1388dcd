pub mod context;
pub mod health;
pub mod presets;
pub mod review;
pub mod rules;
pub mod sheets;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /context                                   current context (GET, PUT)
///
/// /sheets                                    live table set (GET), ingest update (PUT)
/// /snapshot                                  snapshot for the current context
///
/// /review/changes                            pending changes
/// /review/accept|reject|restore              per-change resolution
/// /review/accept-all|reject-all              bulk resolution
/// /review/violations                         violations + error count
/// /review/violations/revert                  revert a violation's cell
/// /review/suggestions                        smart-fix options
/// /review/fix                                write a fixed value
///
/// /presets                                   list, create
/// /presets/import                            import preset JSON
/// /presets/active                            active preset
/// /presets/{id}                              get, rename, delete
/// /presets/{id}/activate                     set active
/// /presets/{id}/duplicate                    duplicate
/// /presets/{id}/export                       export preset JSON
/// /presets/{id}/rules                        add rule
/// /presets/{id}/rules/{rule_id}              update, remove rule
///
/// /rules                                     effective rules
/// /rules/overrides                           reset overrides (DELETE)
/// /rules/table/{name}                        enabled rules for a table
/// /rules/{id}/enabled                        enable override (PUT)
/// /rules/{id}/intercept                      intercept override (PUT)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/context", context::router())
        .merge(sheets::router())
        .nest("/review", review::router())
        .nest("/presets", presets::router())
        .nest("/rules", rules::router())
}
