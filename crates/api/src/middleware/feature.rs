//! Feature gate for the import routes.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sheetport_core::error::CoreError;

use crate::error::AppError;
use crate::state::AppState;

/// Answer 403 on every import route while `IMPORTS_ENABLED` is false.
pub async fn require_imports_enabled(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.imports_enabled {
        return AppError::Core(CoreError::Forbidden(
            "Spreadsheet imports are disabled".into(),
        ))
        .into_response();
    }
    next.run(request).await
}
