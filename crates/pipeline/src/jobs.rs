//! Import job lifecycle: creation, lookup, listing and status updates.

use serde::Deserialize;
use serde_json::json;
use sheetport_core::audit::{action_types, entity_types};
use sheetport_core::error::CoreError;
use sheetport_core::imports::job::{
    rollback_deadline, validate_new_job, validate_transition, ImportJobStatus, ImportLane,
    ImportStats, NewJobRequest,
};
use sheetport_core::imports::upload::key_belongs_to;
use sheetport_core::types::DbId;
use sheetport_db::models::import_job::{
    CreateImportJob, ImportJob, ImportJobQuery, JobChanges, NewImportJob,
};
use sheetport_db::models::import_job_error::ImportJobError;

use crate::context::{audit_entry, Actor, ImportContext};
use crate::error::PipelineError;
use crate::forms::{load_org_form, load_template_mapping};
use crate::ports::ImportStore;

/// Fetch a job or fail with `NotFound`.
pub async fn load_job(store: &dyn ImportStore, id: DbId) -> Result<ImportJob, PipelineError> {
    store
        .find_job(id)
        .await?
        .ok_or_else(|| CoreError::not_found("import_job", id).into())
}

/// Move `job` to `to`, compare-and-swap on its version.
///
/// Returns `Conflict` for an edge outside the state machine and for a lost
/// race against another writer.
pub async fn advance(
    store: &dyn ImportStore,
    job: &ImportJob,
    to: ImportJobStatus,
    changes: &JobChanges,
) -> Result<ImportJob, PipelineError> {
    let from = job.status()?;
    validate_transition(from, to)?;
    store
        .transition_job(job.id, job.version, from, to, changes)
        .await?
        .ok_or_else(|| {
            CoreError::Conflict("Import job was modified concurrently; reload and retry".into())
                .into()
        })
}

/// Best-effort `importing -> failed` after a whole-run fault. The original
/// fault is what the caller reports, so a failure here is only logged.
///
/// Returns the failed job, or `None` when the job had already left
/// `importing` (e.g. it was cancelled) or the write did not land.
pub async fn mark_failed(
    store: &dyn ImportStore,
    job: &ImportJob,
    reason: &str,
) -> Option<ImportJob> {
    let current = match store.find_job(job.id).await {
        Ok(Some(current)) => current,
        Ok(None) => return None,
        Err(e) => {
            tracing::error!(job_id = job.id, error = %e, "Failed to mark import job as failed");
            return None;
        }
    };
    if current.status != ImportJobStatus::Importing.as_str() {
        tracing::info!(
            job_id = job.id,
            status = %current.status,
            "Import job left importing before the fault; not marking failed"
        );
        return None;
    }
    match advance(store, &current, ImportJobStatus::Failed, &JobChanges::failed(reason)).await {
        Ok(failed) => Some(failed),
        Err(e) => {
            tracing::error!(job_id = job.id, error = %e, "Failed to mark import job as failed");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

pub async fn create_job(
    ctx: &ImportContext,
    actor: &Actor,
    input: CreateImportJob,
) -> Result<ImportJob, PipelineError> {
    ctx.access
        .require_org_access(actor, input.organization_id)
        .await?;

    validate_new_job(&NewJobRequest {
        lane: input.lane,
        source_file_key: &input.source_file_key,
        source_file_hash: &input.source_file_hash,
        source_row_count: input.source_row_count,
        mapping_template_id: input.mapping_template_id,
    })?;

    if input.lane == ImportLane::Batch
        && !key_belongs_to(input.organization_id, &input.source_file_key)
    {
        return Err(CoreError::Validation(
            "Source file key does not belong to this organization".into(),
        )
        .into());
    }

    let store = ctx.store.as_ref();
    if let Some(template_id) = input.mapping_template_id {
        load_template_mapping(store, template_id, input.organization_id).await?;
    }
    if let Some(form_id) = input.target_form_id {
        load_org_form(store, form_id, input.organization_id).await?;
    }

    let now = ctx.now();
    let job = store
        .create_job(&NewImportJob {
            organization_id: input.organization_id,
            source_type: input.source_type,
            lane: input.lane,
            source_file_key: input.source_file_key,
            source_file_hash: input.source_file_hash,
            source_row_count: input.source_row_count,
            target_form_id: input.target_form_id,
            mapping_template_id: input.mapping_template_id,
            created_by: actor.user_id,
            rollback_before: rollback_deadline(now, ctx.settings.rollback_window_days),
        })
        .await?;

    tracing::info!(
        job_id = job.id,
        organization_id = job.organization_id,
        lane = %job.lane,
        "Import job created"
    );
    ctx.audit(audit_entry(
        actor,
        Some(job.organization_id),
        action_types::IMPORT_JOB_CREATE,
        entity_types::IMPORT_JOB,
        Some(job.id),
        json!({
            "lane": job.lane,
            "source_type": job.source_type,
            "source_file_key": job.source_file_key,
            "source_file_hash": job.source_file_hash,
            "source_row_count": job.source_row_count,
            "mapping_template_id": job.mapping_template_id,
        }),
    ))
    .await;

    Ok(job)
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// `None` when the job does not exist.
pub async fn get_job(
    ctx: &ImportContext,
    actor: &Actor,
    id: DbId,
) -> Result<Option<ImportJob>, PipelineError> {
    let Some(job) = ctx.store.find_job(id).await? else {
        return Ok(None);
    };
    ctx.access
        .require_org_access(actor, job.organization_id)
        .await?;
    Ok(Some(job))
}

/// Jobs for one organization, or for every organization the actor can see.
pub async fn list_jobs(
    ctx: &ImportContext,
    actor: &Actor,
    query: &ImportJobQuery,
) -> Result<Vec<ImportJob>, PipelineError> {
    let scope = match query.organization_id {
        Some(id) => {
            ctx.access.require_org_access(actor, id).await?;
            Some(vec![id])
        }
        None => {
            if ctx.access.is_global_admin(actor).await? {
                None
            } else {
                Some(ctx.access.organization_ids(actor).await?)
            }
        }
    };
    Ok(ctx.store.list_jobs(scope.as_deref(), query).await?)
}

/// Row errors of one job, highest row number first.
pub async fn list_job_errors(
    ctx: &ImportContext,
    actor: &Actor,
    job_id: DbId,
    limit: Option<i64>,
    offset: Option<i64>,
) -> Result<Vec<ImportJobError>, PipelineError> {
    let job = load_job(ctx.store.as_ref(), job_id).await?;
    ctx.access
        .require_org_access(actor, job.organization_id)
        .await?;
    Ok(ctx.store.list_job_errors(job_id, limit, offset).await?)
}

// ---------------------------------------------------------------------------
// Status updates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub status: ImportJobStatus,
    pub stats: Option<ImportStats>,
    pub error_summary: Option<serde_json::Value>,
}

/// Operator-driven transition (typically cancellation), optionally
/// replacing stats and error summary.
pub async fn update_job_status(
    ctx: &ImportContext,
    actor: &Actor,
    id: DbId,
    update: StatusUpdate,
) -> Result<ImportJob, PipelineError> {
    let job = load_job(ctx.store.as_ref(), id).await?;
    ctx.access
        .require_org_access(actor, job.organization_id)
        .await?;

    if update.status == ImportJobStatus::RolledBack {
        return Err(CoreError::Validation(
            "Use the rollback operation to roll back an import".into(),
        )
        .into());
    }

    let changes = JobChanges {
        stats: update.stats.map(ImportStats::to_json),
        error_summary: update.error_summary,
        error_report_key: None,
        set_started_at: update.status == ImportJobStatus::Validating,
        set_completed_at: update.status.is_terminal() || update.status == ImportJobStatus::Completed,
    };
    let from = job.status.clone();
    let updated = advance(ctx.store.as_ref(), &job, update.status, &changes).await?;

    tracing::info!(job_id = id, from = %from, to = %updated.status, "Import job status updated");
    ctx.audit(audit_entry(
        actor,
        Some(updated.organization_id),
        action_types::IMPORT_JOB_STATUS_UPDATE,
        entity_types::IMPORT_JOB,
        Some(id),
        json!({ "from": from, "to": updated.status }),
    ))
    .await;

    Ok(updated)
}
