//! Form submission models. Imported submissions carry `import_job_id` so a
//! rollback can find exactly the rows one job created.

use serde::{Deserialize, Serialize};
use sheetport_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `form_submissions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FormSubmission {
    pub id: DbId,
    pub form_id: DbId,
    pub form_version_id: DbId,
    pub organization_id: DbId,
    pub import_job_id: Option<DbId>,
    pub payload: serde_json::Value,
    pub completeness: f64,
    pub submitted_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `form_submission_versions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FormSubmissionVersion {
    pub id: DbId,
    pub submission_id: DbId,
    pub version_number: i32,
    pub payload: serde_json::Value,
    pub change_source: String,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting a submission together with its first version entry.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateFormSubmission {
    pub form_id: DbId,
    pub form_version_id: DbId,
    pub organization_id: DbId,
    pub import_job_id: Option<DbId>,
    pub payload: serde_json::Value,
    pub completeness: f64,
    pub submitted_by: Option<DbId>,
}
