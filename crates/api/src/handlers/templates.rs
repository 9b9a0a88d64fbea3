//! Handlers for mapping templates and template file downloads.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use sheetport_core::types::DbId;
use sheetport_db::models::mapping_template::{CreateMappingTemplate, UpdateMappingTemplate};
use sheetport_pipeline::templates::{self, TemplateDownloadRequest};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListTemplatesParams {
    pub organization_id: Option<DbId>,
}

/// GET /imports/templates
pub async fn list_templates(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<ListTemplatesParams>,
) -> AppResult<impl IntoResponse> {
    let items =
        templates::list_templates(&state.imports, &auth.actor(), params.organization_id).await?;
    Ok(Json(DataResponse { data: items }))
}

/// GET /imports/templates/{id}
pub async fn get_template(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let template = templates::get_template(&state.imports, &auth.actor(), id).await?;
    Ok(Json(DataResponse { data: template }))
}

/// POST /imports/templates
pub async fn create_template(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateMappingTemplate>,
) -> AppResult<impl IntoResponse> {
    let template = templates::create_template(&state.imports, &auth.actor(), input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: template })))
}

/// PUT /imports/templates/{id}
pub async fn update_template(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(patch): Json<UpdateMappingTemplate>,
) -> AppResult<impl IntoResponse> {
    let template = templates::update_template(&state.imports, &auth.actor(), id, patch).await?;
    Ok(Json(DataResponse { data: template }))
}

/// DELETE /imports/templates/{id}
pub async fn delete_template(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    templates::delete_template(&state.imports, &auth.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /imports/templates/download
///
/// Responds with the file itself rather than a JSON envelope.
pub async fn download_template(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(request): Json<TemplateDownloadRequest>,
) -> AppResult<impl IntoResponse> {
    let file = templates::download_template(&state.imports, &auth.actor(), &request).await?;
    let disposition = format!("attachment; filename=\"{}\"", file.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.bytes,
    ))
}
