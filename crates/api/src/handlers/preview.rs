//! Handlers for the pre-import preview and autofix.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use sheetport_pipeline::preview::{self, ApplyFixRequest, PreviewRequest};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /imports/preview
pub async fn preview_import(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(request): Json<PreviewRequest>,
) -> AppResult<impl IntoResponse> {
    let report = preview::preview_import(&state.imports, &auth.actor(), request).await?;
    Ok(Json(DataResponse { data: report }))
}

/// POST /imports/preview/apply-fix
///
/// Stateless: the client sends its current rows and mapping and keeps the
/// previous ones for undo.
pub async fn apply_fix(
    _auth: AuthUser,
    Json(request): Json<ApplyFixRequest>,
) -> AppResult<impl IntoResponse> {
    let result = preview::apply_fix(request)?;
    Ok(Json(DataResponse { data: result }))
}
