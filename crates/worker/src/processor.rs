//! Batch job processing: download, decode, import in checkpointed chunks,
//! report, complete.

use std::sync::Arc;

use serde_json::json;
use sheetport_core::audit::{action_types, entity_types};
use sheetport_core::error::CoreError;
use sheetport_core::hashing::sha256_hex;
use sheetport_core::imports::job::{ImportJobStatus, ImportStats, SourceType};
use sheetport_core::imports::upload::error_report_key;
use sheetport_core::pagination::MAX_PAGE_LIMIT;
use sheetport_db::models::audit::CreateAuditLog;
use sheetport_db::models::import_job::{ImportJob, JobChanges};
use sheetport_db::models::import_job_error::ImportJobError;
use sheetport_pipeline::forms::{load_org_form, load_template_mapping};
use sheetport_pipeline::importer::{reject_file_fields, RowImporter};
use sheetport_pipeline::jobs::advance;
use sheetport_pipeline::ports::{AuditSink, ImportStore, ObjectStorage};
use sheetport_pipeline::{ImportContext, PipelineError};

use crate::report::render_error_report;
use crate::source::parse_csv;

/// Why a run stopped; `reason` lands in the job's error summary.
struct RunFailure {
    reason: &'static str,
    error: PipelineError,
}

trait FailWith<T> {
    fn fail_with(self, reason: &'static str) -> Result<T, RunFailure>;
}

impl<T, E: Into<PipelineError>> FailWith<T> for Result<T, E> {
    fn fail_with(self, reason: &'static str) -> Result<T, RunFailure> {
        self.map_err(|e| RunFailure {
            reason,
            error: e.into(),
        })
    }
}

/// Runs batch jobs against the injected store, storage and audit sink.
pub struct BatchProcessor {
    store: Arc<dyn ImportStore>,
    storage: Arc<dyn ObjectStorage>,
    audit: Arc<dyn AuditSink>,
    chunk_size: usize,
}

impl BatchProcessor {
    pub fn new(
        store: Arc<dyn ImportStore>,
        storage: Arc<dyn ObjectStorage>,
        audit: Arc<dyn AuditSink>,
        chunk_size: usize,
    ) -> Self {
        Self {
            store,
            storage,
            audit,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn from_context(ctx: &ImportContext, chunk_size: usize) -> Self {
        Self::new(
            ctx.store.clone(),
            ctx.storage.clone(),
            ctx.audit.clone(),
            chunk_size,
        )
    }

    pub fn store(&self) -> &dyn ImportStore {
        self.store.as_ref()
    }

    /// Take a `validated` job to `importing` and process it.
    pub async fn start(&self, job: &ImportJob) -> Result<ImportStats, PipelineError> {
        let job = advance(
            self.store(),
            job,
            ImportJobStatus::Importing,
            &JobChanges::default(),
        )
        .await?;
        self.process(job).await
    }

    /// Process a job already claimed into `importing`.
    ///
    /// Whole-run faults move the job to `failed` and are returned; row-level
    /// problems are recorded as job errors.
    pub async fn process(&self, job: ImportJob) -> Result<ImportStats, PipelineError> {
        tracing::info!(
            job_id = job.id,
            checkpoint = job.progress_checkpoint,
            "Batch import started"
        );
        match self.run(&job).await {
            Ok(stats) => Ok(stats),
            Err(failure) => {
                tracing::error!(
                    job_id = job.id,
                    reason = failure.reason,
                    error = %failure.error,
                    "Batch import failed"
                );
                self.fail(&job, failure.reason).await;
                Err(failure.error)
            }
        }
    }

    async fn run(&self, job: &ImportJob) -> Result<ImportStats, RunFailure> {
        let store = self.store();

        if job.source_type().fail_with("corrupt_job")? == SourceType::Excel {
            return Err(RunFailure {
                reason: "unsupported_source_type",
                error: CoreError::Validation(
                    "Batch imports can only decode CSV sources".into(),
                )
                .into(),
            });
        }
        let (template_id, form_id) = match (job.mapping_template_id, job.target_form_id) {
            (Some(t), Some(f)) => (t, f),
            _ => {
                return Err(RunFailure {
                    reason: "missing_configuration",
                    error: CoreError::Validation(
                        "Batch imports require a mapping template and a target form".into(),
                    )
                    .into(),
                })
            }
        };
        let (_, mapping) = load_template_mapping(store, template_id, job.organization_id)
            .await
            .fail_with("missing_configuration")?;
        let form = load_org_form(store, form_id, job.organization_id)
            .await
            .fail_with("missing_configuration")?;
        reject_file_fields(&form.definition, &mapping).fail_with("missing_configuration")?;

        let bytes = self
            .storage
            .get_object(&job.source_file_key)
            .await
            .fail_with("source_unavailable")?;
        let actual_hash = sha256_hex(&bytes);
        if !actual_hash.eq_ignore_ascii_case(&job.source_file_hash) {
            tracing::warn!(
                job_id = job.id,
                expected = %job.source_file_hash,
                actual = %actual_hash,
                "Source file hash does not match the hash recorded at job creation"
            );
        }
        let source = parse_csv(&bytes).fail_with("invalid_source")?;
        if job
            .source_row_count
            .is_some_and(|n| n as usize != source.rows.len())
        {
            tracing::warn!(
                job_id = job.id,
                declared = job.source_row_count,
                parsed = source.rows.len(),
                "Parsed row count differs from the declared count"
            );
        }

        let start = usize::try_from(job.progress_checkpoint)
            .unwrap_or(0)
            .min(source.rows.len());
        let resumed = if start > 0 {
            job.stats()
        } else {
            ImportStats::default()
        };
        let mut importer =
            RowImporter::new(&form, &mapping, job, job.created_by).with_stats(resumed);
        let mut current = job.clone();

        for (chunk_index, chunk) in source.rows[start..].chunks(self.chunk_size).enumerate() {
            let first = start + chunk_index * self.chunk_size;
            for (offset, row) in chunk.iter().enumerate() {
                let row_number = (first + offset + 1) as i32;
                importer
                    .import_row(store, row, row_number)
                    .await
                    .fail_with("database_error")?;
            }

            let errors = importer.take_errors();
            if !errors.is_empty() {
                store
                    .insert_job_errors(job.id, &errors)
                    .await
                    .fail_with("database_error")?;
            }

            let checkpoint = (first + chunk.len()) as i32;
            current = store
                .record_progress(current.id, current.version, checkpoint, &importer.stats())
                .await
                .fail_with("database_error")?
                .ok_or_else(|| RunFailure {
                    reason: "job_modified",
                    error: CoreError::Conflict(
                        "Import job was modified while the batch was running".into(),
                    )
                    .into(),
                })?;
            tracing::debug!(job_id = job.id, checkpoint, "Batch chunk committed");
        }

        let stats = importer.stats();
        let report_key = if stats.error_count > 0 {
            Some(self.upload_report(job.id).await?)
        } else {
            None
        };

        let completed = advance(
            store,
            &current,
            ImportJobStatus::Completed,
            &JobChanges {
                error_report_key: report_key,
                ..JobChanges::finished(&stats)
            },
        )
        .await
        .fail_with("database_error")?;

        tracing::info!(
            job_id = completed.id,
            processed = stats.processed,
            inserted = stats.inserted,
            failed = stats.failed,
            "Batch import completed"
        );
        self.record_audit(
            &completed,
            action_types::IMPORT_JOB_COMPLETE,
            json!({
                "lane": completed.lane,
                "stats": stats,
                "error_report_key": completed.error_report_key,
            }),
        )
        .await;

        Ok(stats)
    }

    /// Write every stored error of the job as `errors.csv`.
    async fn upload_report(&self, job_id: i64) -> Result<String, RunFailure> {
        let mut errors: Vec<ImportJobError> = Vec::new();
        loop {
            let page = self
                .store()
                .list_job_errors(job_id, Some(MAX_PAGE_LIMIT), Some(errors.len() as i64))
                .await
                .fail_with("database_error")?;
            let done = (page.len() as i64) < MAX_PAGE_LIMIT;
            errors.extend(page);
            if done {
                break;
            }
        }

        let bytes = render_error_report(&errors).fail_with("report_failed")?;
        let key = error_report_key(job_id);
        self.storage
            .put_object(&key, bytes, "text/csv")
            .await
            .fail_with("report_failed")?;
        Ok(key)
    }

    /// Move the job to `failed` unless something else already ended it.
    async fn fail(&self, job: &ImportJob, reason: &str) {
        let current = match self.store().find_job(job.id).await {
            Ok(Some(current)) => current,
            Ok(None) => return,
            Err(e) => {
                tracing::error!(job_id = job.id, error = %e, "Failed to reload import job");
                return;
            }
        };
        if current.status().ok() != Some(ImportJobStatus::Importing) {
            tracing::info!(
                job_id = job.id,
                status = %current.status,
                "Import job already left importing; not marking failed"
            );
            return;
        }
        match advance(
            self.store(),
            &current,
            ImportJobStatus::Failed,
            &JobChanges::failed(reason),
        )
        .await
        {
            Ok(failed) => {
                self.record_audit(
                    &failed,
                    action_types::IMPORT_JOB_FAIL,
                    json!({ "lane": failed.lane, "reason": reason }),
                )
                .await;
            }
            Err(e) => {
                tracing::error!(job_id = job.id, error = %e, "Failed to mark import job as failed");
            }
        }
    }

    async fn record_audit(&self, job: &ImportJob, action: &str, details: serde_json::Value) {
        let entry = CreateAuditLog {
            user_id: job.created_by,
            organization_id: Some(job.organization_id),
            action_type: action.to_string(),
            entity_type: Some(entity_types::IMPORT_JOB.to_string()),
            entity_id: Some(job.id),
            details_json: Some(details),
        };
        if let Err(e) = self.audit.record(entry).await {
            tracing::warn!(job_id = job.id, error = %e, action, "Failed to record audit entry");
        }
    }
}
