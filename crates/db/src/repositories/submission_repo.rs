//! Repository for `form_submissions` and their version history.

use sqlx::PgPool;
use sheetport_core::types::DbId;

use crate::models::submission::{CreateFormSubmission, FormSubmission};

const COLUMNS: &str = "id, form_id, form_version_id, organization_id, import_job_id, payload, \
    completeness, submitted_by, created_at, updated_at";

pub struct SubmissionRepo;

impl SubmissionRepo {
    /// Insert a submission and its version 1 history entry atomically.
    pub async fn create_with_version(
        pool: &PgPool,
        input: &CreateFormSubmission,
    ) -> Result<FormSubmission, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO form_submissions
                (form_id, form_version_id, organization_id, import_job_id, payload,
                 completeness, submitted_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        let submission = sqlx::query_as::<_, FormSubmission>(&query)
            .bind(input.form_id)
            .bind(input.form_version_id)
            .bind(input.organization_id)
            .bind(input.import_job_id)
            .bind(&input.payload)
            .bind(input.completeness)
            .bind(input.submitted_by)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO form_submission_versions
                (submission_id, version_number, payload, change_source, created_by)
             VALUES ($1, 1, $2, 'import', $3)",
        )
        .bind(submission.id)
        .bind(&input.payload)
        .bind(input.submitted_by)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(submission)
    }

    pub async fn count_by_job(pool: &PgPool, job_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM form_submissions WHERE import_job_id = $1",
        )
        .bind(job_id)
        .fetch_one(pool)
        .await
    }
}
