//! Interactive lane: the caller supplies parsed rows and waits for the
//! result.

use serde::{Deserialize, Serialize};
use serde_json::json;
use sheetport_core::audit::{action_types, entity_types};
use sheetport_core::error::CoreError;
use sheetport_core::imports::job::{ImportJobStatus, ImportLane, ImportStats};
use sheetport_core::imports::mapping::ColumnMapping;
use sheetport_core::types::{DbId, JsonRecord};
use sheetport_db::models::import_job::{ImportJob, JobChanges};

use crate::context::{audit_entry, Actor, ImportContext};
use crate::error::PipelineError;
use crate::forms::{load_org_form, LoadedForm};
use crate::importer::{reject_file_fields, RowImporter};
use crate::jobs::{advance, load_job, mark_failed};

#[derive(Debug, Clone, Deserialize)]
pub struct InteractiveRunRequest {
    pub job_id: DbId,
    pub form_id: DbId,
    pub mapping: ColumnMapping,
    pub rows: Vec<JsonRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractiveRunOutcome {
    pub success: bool,
    pub stats: ImportStats,
    pub error_count: i64,
}

/// Run an interactive import to completion.
///
/// Every precondition is checked before the job leaves `pending`. Rows are
/// processed in order; invalid rows become error records and the run
/// continues. Only infrastructure faults fail the job.
pub async fn run_interactive(
    ctx: &ImportContext,
    actor: &Actor,
    request: InteractiveRunRequest,
) -> Result<InteractiveRunOutcome, PipelineError> {
    let store = ctx.store.as_ref();
    let job = load_job(store, request.job_id).await?;

    if job.lane()? != ImportLane::Interactive {
        return Err(CoreError::Validation("Import job is not an interactive import".into()).into());
    }
    ctx.access
        .require_org_access(actor, job.organization_id)
        .await?;
    if job.target_form_id.is_some_and(|id| id != request.form_id) {
        return Err(CoreError::Validation(
            "Form does not match the import job's target form".into(),
        )
        .into());
    }

    let form = load_org_form(store, request.form_id, job.organization_id).await?;
    reject_file_fields(&form.definition, &request.mapping)?;

    if job.status()? != ImportJobStatus::Pending {
        return Err(CoreError::Conflict(format!(
            "Import job is {} and cannot be run again",
            job.status
        ))
        .into());
    }

    let job = advance(store, &job, ImportJobStatus::Validating, &JobChanges::started()).await?;
    let job = advance(store, &job, ImportJobStatus::Validated, &JobChanges::default()).await?;
    let job = advance(store, &job, ImportJobStatus::Importing, &JobChanges::default()).await?;

    tracing::info!(
        job_id = job.id,
        rows = request.rows.len(),
        "Interactive import started"
    );

    match import_rows(ctx, actor, &job, &form, &request).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            let reason = e.failure_reason();
            tracing::error!(job_id = job.id, error = %e, reason, "Interactive import failed");
            if let Some(failed) = mark_failed(store, &job, reason).await {
                ctx.audit(audit_entry(
                    actor,
                    Some(failed.organization_id),
                    action_types::IMPORT_JOB_FAIL,
                    entity_types::IMPORT_JOB,
                    Some(failed.id),
                    json!({ "lane": failed.lane, "reason": reason }),
                ))
                .await;
            }
            Err(e)
        }
    }
}

async fn import_rows(
    ctx: &ImportContext,
    actor: &Actor,
    job: &ImportJob,
    form: &LoadedForm,
    request: &InteractiveRunRequest,
) -> Result<InteractiveRunOutcome, PipelineError> {
    let store = ctx.store.as_ref();
    let mut importer = RowImporter::new(form, &request.mapping, job, Some(actor.user_id));

    for (index, row) in request.rows.iter().enumerate() {
        importer.import_row(store, row, index as i32 + 1).await?;
    }

    let errors = importer.take_errors();
    if !errors.is_empty() {
        store.insert_job_errors(job.id, &errors).await?;
    }

    let stats = importer.stats();
    let completed = advance(
        store,
        job,
        ImportJobStatus::Completed,
        &JobChanges::finished(&stats),
    )
    .await?;

    tracing::info!(
        job_id = completed.id,
        processed = stats.processed,
        inserted = stats.inserted,
        failed = stats.failed,
        "Interactive import completed"
    );
    ctx.audit(audit_entry(
        actor,
        Some(completed.organization_id),
        action_types::IMPORT_JOB_COMPLETE,
        entity_types::IMPORT_JOB,
        Some(completed.id),
        json!({ "lane": completed.lane, "stats": stats }),
    ))
    .await;

    Ok(InteractiveRunOutcome {
        success: true,
        stats,
        error_count: stats.error_count,
    })
}
