//! Row-level import error models. Written in bulk, never updated.

use serde::{Deserialize, Serialize};
use sheetport_core::imports::row::RowError;
use sheetport_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `import_job_errors` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ImportJobError {
    pub id: DbId,
    pub job_id: DbId,
    pub row_number: i32,
    pub field_key: Option<String>,
    pub error_type: String,
    pub error_message: String,
    pub raw_value: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for one error row in a batch insert.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateImportJobError {
    pub row_number: i32,
    pub field_key: Option<String>,
    pub error_type: String,
    pub error_message: String,
    pub raw_value: Option<String>,
}

impl From<RowError> for CreateImportJobError {
    fn from(error: RowError) -> Self {
        Self {
            row_number: error.row_number,
            field_key: error.field_key,
            error_type: error.error_type,
            error_message: error.message,
            raw_value: error.raw_value,
        }
    }
}
