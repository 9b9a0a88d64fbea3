use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use sheetport_pipeline::uploads::{self, UploadRequest};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /imports/uploads
///
/// Issues a storage key and a signed PUT URL; the client uploads directly
/// to storage and passes the key to job creation.
pub async fn create_upload(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(request): Json<UploadRequest>,
) -> AppResult<impl IntoResponse> {
    let ticket = uploads::create_upload(&state.imports, &auth.actor(), &request).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: ticket })))
}
