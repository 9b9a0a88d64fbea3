pub mod health;
pub mod imports;

use axum::middleware::from_fn_with_state;
use axum::Router;

use crate::middleware::feature::require_imports_enabled;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /imports/...      spreadsheet import routes (see `imports::router`),
///                   all gated by IMPORTS_ENABLED
/// ```
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new().nest(
        "/imports",
        imports::router().route_layer(from_fn_with_state(state, require_imports_enabled)),
    )
}
