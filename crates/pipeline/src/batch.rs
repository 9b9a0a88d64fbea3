//! Batch lane entry: validate the job, mark it `validated` and hand it to
//! the configured dispatcher.

use serde::Serialize;
use sheetport_core::error::CoreError;
use sheetport_core::imports::job::{ImportJobStatus, ImportLane};
use sheetport_core::types::DbId;
use sheetport_db::models::import_job::{ImportJob, JobChanges};

use crate::context::{Actor, ImportContext};
use crate::error::PipelineError;
use crate::forms::{load_org_form, load_template_mapping};
use crate::importer::reject_file_fields;
use crate::jobs::{advance, load_job};
use crate::ports::BatchDispatch;

#[derive(Debug, Clone, Serialize)]
pub struct BatchRunOutcome {
    pub job: ImportJob,
    pub dispatch: BatchDispatch,
}

pub async fn run_batch(
    ctx: &ImportContext,
    actor: &Actor,
    job_id: DbId,
) -> Result<BatchRunOutcome, PipelineError> {
    let store = ctx.store.as_ref();
    let job = load_job(store, job_id).await?;

    if job.lane()? != ImportLane::Batch {
        return Err(CoreError::Validation("Import job is not a batch import".into()).into());
    }
    ctx.access
        .require_org_access(actor, job.organization_id)
        .await?;

    let template_id = job.mapping_template_id.ok_or_else(|| {
        CoreError::Validation("Batch imports require a mapping template".into())
    })?;
    let form_id = job
        .target_form_id
        .ok_or_else(|| CoreError::Validation("Batch imports require a target form".into()))?;

    let (_, mapping) = load_template_mapping(store, template_id, job.organization_id).await?;
    let form = load_org_form(store, form_id, job.organization_id).await?;
    reject_file_fields(&form.definition, &mapping)?;

    if job.status()? != ImportJobStatus::Pending {
        return Err(CoreError::Conflict(format!(
            "Import job is {} and cannot be started again",
            job.status
        ))
        .into());
    }

    let job = advance(store, &job, ImportJobStatus::Validating, &JobChanges::started()).await?;
    let job = advance(store, &job, ImportJobStatus::Validated, &JobChanges::default()).await?;

    let dispatch = ctx.dispatcher.dispatch(&job).await?;
    tracing::info!(job_id = job.id, ?dispatch, "Batch import dispatched");

    Ok(BatchRunOutcome { job, dispatch })
}
