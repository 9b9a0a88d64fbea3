//! Repository for the `import_jobs` table.
//!
//! Every status change is a compare-and-swap on `(id, version, status)`.
//! A method returning `Ok(None)` means the row moved underneath the caller.

use sqlx::PgPool;
use sheetport_core::imports::job::{ImportJobStatus, ImportLane};
use sheetport_core::pagination::{clamp_limit, clamp_offset, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use sheetport_core::types::{DbId, Timestamp};

use crate::models::import_job::{ImportJob, ImportJobQuery, JobChanges, NewImportJob};

/// Column list for import_jobs queries.
const COLUMNS: &str = "id, organization_id, source_type, lane, status, source_file_key, \
    source_file_hash, source_row_count, target_form_id, mapping_template_id, stats, \
    error_summary, progress_checkpoint, error_report_key, can_rollback, rollback_before, \
    version, created_by, started_at, completed_at, created_at, updated_at";

/// A job that was rolled back, with the number of submissions removed.
#[derive(Debug, Clone)]
pub struct RolledBackJob {
    pub job: ImportJob,
    pub deleted_count: u64,
}

pub struct ImportJobRepo;

impl ImportJobRepo {
    /// Insert a job in `pending`.
    pub async fn create(pool: &PgPool, input: &NewImportJob) -> Result<ImportJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO import_jobs
                (organization_id, source_type, lane, status, source_file_key, source_file_hash,
                 source_row_count, target_form_id, mapping_template_id, created_by, rollback_before)
             VALUES ($1, $2, $3, 'pending', $4, $5, $6, $7, $8, $9, $10)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImportJob>(&query)
            .bind(input.organization_id)
            .bind(input.source_type.as_str())
            .bind(input.lane.as_str())
            .bind(&input.source_file_key)
            .bind(&input.source_file_hash)
            .bind(input.source_row_count)
            .bind(input.target_form_id)
            .bind(input.mapping_template_id)
            .bind(input.created_by)
            .bind(input.rollback_before)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ImportJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM import_jobs WHERE id = $1");
        sqlx::query_as::<_, ImportJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Move a job from `from` to `to` if nobody else has touched it since
    /// `expected_version` was read. Optional column changes apply in the same
    /// statement.
    pub async fn transition(
        pool: &PgPool,
        id: DbId,
        expected_version: i64,
        from: ImportJobStatus,
        to: ImportJobStatus,
        changes: &JobChanges,
    ) -> Result<Option<ImportJob>, sqlx::Error> {
        let query = format!(
            "UPDATE import_jobs SET
                status = $4,
                version = version + 1,
                stats = COALESCE($5, stats),
                error_summary = COALESCE($6, error_summary),
                error_report_key = COALESCE($7, error_report_key),
                started_at = CASE WHEN $8 THEN NOW() ELSE started_at END,
                completed_at = CASE WHEN $9 THEN NOW() ELSE completed_at END
             WHERE id = $1 AND version = $2 AND status = $3
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImportJob>(&query)
            .bind(id)
            .bind(expected_version)
            .bind(from.as_str())
            .bind(to.as_str())
            .bind(&changes.stats)
            .bind(&changes.error_summary)
            .bind(&changes.error_report_key)
            .bind(changes.set_started_at)
            .bind(changes.set_completed_at)
            .fetch_optional(pool)
            .await
    }

    /// Record a chunk boundary for a job in `importing`.
    pub async fn record_progress(
        pool: &PgPool,
        id: DbId,
        expected_version: i64,
        checkpoint: i32,
        stats: &serde_json::Value,
    ) -> Result<Option<ImportJob>, sqlx::Error> {
        let query = format!(
            "UPDATE import_jobs SET
                progress_checkpoint = $3,
                stats = $4,
                version = version + 1
             WHERE id = $1 AND version = $2 AND status = 'importing'
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImportJob>(&query)
            .bind(id)
            .bind(expected_version)
            .bind(checkpoint)
            .bind(stats)
            .fetch_optional(pool)
            .await
    }

    /// Claim the oldest validated batch job and move it to `importing`.
    ///
    /// Concurrent workers skip rows another worker already locked.
    pub async fn claim_next_batch(pool: &PgPool) -> Result<Option<ImportJob>, sqlx::Error> {
        let query = format!(
            "UPDATE import_jobs SET
                status = 'importing',
                version = version + 1,
                started_at = COALESCE(started_at, NOW())
             WHERE id = (
                SELECT id FROM import_jobs
                WHERE status = 'validated' AND lane = $1
                ORDER BY created_at
                LIMIT 1
                FOR UPDATE SKIP LOCKED
             )
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImportJob>(&query)
            .bind(ImportLane::Batch.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Atomically roll a job back: flip the status and eligibility flag,
    /// delete the job's submissions and blank raw values on its error rows.
    ///
    /// Returns `None` (and changes nothing) when the job is no longer
    /// completed, rollback-enabled and inside its window at `now`.
    pub async fn rollback(
        pool: &PgPool,
        id: DbId,
        now: Timestamp,
    ) -> Result<Option<RolledBackJob>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE import_jobs SET
                status = 'rolled_back',
                can_rollback = FALSE,
                completed_at = $2,
                version = version + 1
             WHERE id = $1
               AND status = 'completed'
               AND can_rollback
               AND rollback_before > $2
             RETURNING {COLUMNS}"
        );
        let job = sqlx::query_as::<_, ImportJob>(&query)
            .bind(id)
            .bind(now)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(job) = job else {
            tx.rollback().await?;
            return Ok(None);
        };

        let deleted = sqlx::query("DELETE FROM form_submissions WHERE import_job_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE import_job_errors SET raw_value = NULL WHERE job_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(job_id = id, deleted = deleted.rows_affected(), "Import job rolled back");
        Ok(Some(RolledBackJob {
            job,
            deleted_count: deleted.rows_affected(),
        }))
    }

    /// List jobs newest first, restricted to `organization_ids` when given.
    pub async fn list(
        pool: &PgPool,
        organization_ids: Option<&[DbId]>,
        params: &ImportJobQuery,
    ) -> Result<Vec<ImportJob>, sqlx::Error> {
        let limit = clamp_limit(params.limit, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT);
        let offset = clamp_offset(params.offset);
        let query = format!(
            "SELECT {COLUMNS} FROM import_jobs
             WHERE ($1::BIGINT[] IS NULL OR organization_id = ANY($1))
               AND ($2::TEXT IS NULL OR status = $2)
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, ImportJob>(&query)
            .bind(organization_ids)
            .bind(params.status.map(|s| s.as_str()))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
