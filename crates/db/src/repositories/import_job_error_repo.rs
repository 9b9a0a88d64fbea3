//! Repository for the `import_job_errors` table.

use sqlx::PgPool;
use sheetport_core::pagination::{clamp_limit, clamp_offset, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use sheetport_core::types::DbId;

use crate::models::import_job_error::{CreateImportJobError, ImportJobError};

const COLUMNS: &str =
    "id, job_id, row_number, field_key, error_type, error_message, raw_value, created_at";

/// Rows per INSERT; keeps bind parameters well under the Postgres limit.
const INSERT_CHUNK: usize = 1_000;

pub struct ImportJobErrorRepo;

impl ImportJobErrorRepo {
    /// Insert all errors for a job using multi-row INSERTs. Returns the
    /// number of rows written.
    pub async fn batch_insert(
        pool: &PgPool,
        job_id: DbId,
        errors: &[CreateImportJobError],
    ) -> Result<u64, sqlx::Error> {
        let mut written = 0;
        for chunk in errors.chunks(INSERT_CHUNK) {
            let mut query = String::from(
                "INSERT INTO import_job_errors \
                 (job_id, row_number, field_key, error_type, error_message, raw_value) VALUES ",
            );
            for (i, _) in chunk.iter().enumerate() {
                if i > 0 {
                    query.push_str(", ");
                }
                let base = i * 5 + 2;
                query.push_str(&format!(
                    "($1, ${}, ${}, ${}, ${}, ${})",
                    base,
                    base + 1,
                    base + 2,
                    base + 3,
                    base + 4
                ));
            }

            let mut q = sqlx::query(&query).bind(job_id);
            for error in chunk {
                q = q
                    .bind(error.row_number)
                    .bind(&error.field_key)
                    .bind(&error.error_type)
                    .bind(&error.error_message)
                    .bind(&error.raw_value);
            }
            written += q.execute(pool).await?.rows_affected();
        }
        Ok(written)
    }

    /// Errors for one job, highest row number first.
    pub async fn list_by_job(
        pool: &PgPool,
        job_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<ImportJobError>, sqlx::Error> {
        let limit = clamp_limit(limit, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT);
        let offset = clamp_offset(offset);
        let query = format!(
            "SELECT {COLUMNS} FROM import_job_errors
             WHERE job_id = $1
             ORDER BY row_number DESC, id DESC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, ImportJobError>(&query)
            .bind(job_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
