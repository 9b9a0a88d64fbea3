//! Handlers for import jobs: creation, queries, status updates, runs and
//! rollback.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use sheetport_core::error::CoreError;
use sheetport_core::imports::mapping::ColumnMapping;
use sheetport_core::types::{DbId, JsonRecord};
use sheetport_db::models::import_job::{CreateImportJob, ImportJobQuery};
use sheetport_pipeline::interactive::InteractiveRunRequest;
use sheetport_pipeline::jobs::StatusUpdate;
use sheetport_pipeline::{batch, interactive, jobs, rollback};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ListErrorsParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Body for `POST /imports/jobs/{id}/run`.
#[derive(Debug, Deserialize)]
pub struct RunInteractiveBody {
    pub form_id: DbId,
    pub mapping: ColumnMapping,
    pub rows: Vec<JsonRecord>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RollbackBody {
    pub reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /imports/jobs
pub async fn create_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateImportJob>,
) -> AppResult<impl IntoResponse> {
    let job = jobs::create_job(&state.imports, &auth.actor(), input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

/// GET /imports/jobs
pub async fn list_jobs(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ImportJobQuery>,
) -> AppResult<impl IntoResponse> {
    let jobs = jobs::list_jobs(&state.imports, &auth.actor(), &query).await?;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /imports/jobs/{id}
pub async fn get_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = jobs::get_job(&state.imports, &auth.actor(), id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::not_found("import_job", id)))?;
    Ok(Json(DataResponse { data: job }))
}

/// GET /imports/jobs/{id}/errors
///
/// Highest row number first.
pub async fn list_job_errors(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(params): Query<ListErrorsParams>,
) -> AppResult<impl IntoResponse> {
    let errors =
        jobs::list_job_errors(&state.imports, &auth.actor(), id, params.limit, params.offset)
            .await?;
    Ok(Json(DataResponse { data: errors }))
}

/// PATCH /imports/jobs/{id}/status
pub async fn update_job_status(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(update): Json<StatusUpdate>,
) -> AppResult<impl IntoResponse> {
    let job = jobs::update_job_status(&state.imports, &auth.actor(), id, update).await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /imports/jobs/{id}/run
///
/// Runs an interactive import to completion before responding.
pub async fn run_interactive(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(body): Json<RunInteractiveBody>,
) -> AppResult<impl IntoResponse> {
    let outcome = interactive::run_interactive(
        &state.imports,
        &auth.actor(),
        InteractiveRunRequest {
            job_id: id,
            form_id: body.form_id,
            mapping: body.mapping,
            rows: body.rows,
        },
    )
    .await?;
    Ok(Json(DataResponse { data: outcome }))
}

/// POST /imports/jobs/{id}/run-batch
pub async fn run_batch(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let outcome = batch::run_batch(&state.imports, &auth.actor(), id).await?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: outcome })))
}

/// POST /imports/jobs/{id}/rollback
pub async fn rollback_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    body: Option<Json<RollbackBody>>,
) -> AppResult<impl IntoResponse> {
    let reason = body.and_then(|Json(b)| b.reason);
    let outcome = rollback::rollback_job(&state.imports, &auth.actor(), id, reason).await?;
    Ok(Json(DataResponse { data: outcome }))
}
