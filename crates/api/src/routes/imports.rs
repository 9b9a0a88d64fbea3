//! Route definitions for spreadsheet imports.
//!
//! Mounted at `/imports`.

use axum::routing::{get, patch, post};
use axum::Router;

use crate::handlers::{imports, preview, templates, uploads};
use crate::state::AppState;

/// Routes mounted at `/imports`.
///
/// ```text
/// POST   /uploads                   -> create_upload
/// POST   /preview                   -> preview_import
/// POST   /preview/apply-fix         -> apply_fix
///
/// POST   /jobs                      -> create_job
/// GET    /jobs                      -> list_jobs
/// GET    /jobs/{id}                 -> get_job
/// GET    /jobs/{id}/errors          -> list_job_errors
/// PATCH  /jobs/{id}/status          -> update_job_status
/// POST   /jobs/{id}/run             -> run_interactive
/// POST   /jobs/{id}/run-batch       -> run_batch
/// POST   /jobs/{id}/rollback        -> rollback_job
///
/// GET    /templates                 -> list_templates
/// POST   /templates                 -> create_template
/// GET    /templates/{id}            -> get_template
/// PUT    /templates/{id}            -> update_template
/// DELETE /templates/{id}            -> delete_template
/// POST   /templates/download        -> download_template
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/uploads", post(uploads::create_upload))
        .route("/preview", post(preview::preview_import))
        .route("/preview/apply-fix", post(preview::apply_fix))
        .route(
            "/jobs",
            post(imports::create_job).get(imports::list_jobs),
        )
        .route("/jobs/{id}", get(imports::get_job))
        .route("/jobs/{id}/errors", get(imports::list_job_errors))
        .route("/jobs/{id}/status", patch(imports::update_job_status))
        .route("/jobs/{id}/run", post(imports::run_interactive))
        .route("/jobs/{id}/run-batch", post(imports::run_batch))
        .route("/jobs/{id}/rollback", post(imports::rollback_job))
        .route(
            "/templates",
            get(templates::list_templates).post(templates::create_template),
        )
        .route("/templates/download", post(templates::download_template))
        .route(
            "/templates/{id}",
            get(templates::get_template)
                .put(templates::update_template)
                .delete(templates::delete_template),
        )
}
