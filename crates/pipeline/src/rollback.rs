//! Time-boxed rollback of a completed import.

use serde::Serialize;
use serde_json::json;
use sheetport_core::audit::{action_types, entity_types};
use sheetport_core::error::CoreError;
use sheetport_core::imports::job::check_rollback;
use sheetport_core::types::DbId;

use crate::context::{audit_entry, Actor, ImportContext};
use crate::error::PipelineError;
use crate::jobs::load_job;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RollbackOutcome {
    pub success: bool,
    pub deleted_count: u64,
}

/// Delete every submission the job created and mark it `rolled_back`.
///
/// Checks, in order: job exists, organization access, rollback enabled,
/// window still open, status `completed`. The final flip and deletion is a
/// single conditional write; losing it to a concurrent rollback is a
/// `Conflict`.
pub async fn rollback_job(
    ctx: &ImportContext,
    actor: &Actor,
    job_id: DbId,
    reason: Option<String>,
) -> Result<RollbackOutcome, PipelineError> {
    let store = ctx.store.as_ref();
    let job = load_job(store, job_id).await?;
    ctx.access
        .require_org_access(actor, job.organization_id)
        .await?;

    let now = ctx.now();
    check_rollback(&job.rollback_check()?, now)?;

    let rolled = store.rollback_job(job_id, now).await?.ok_or_else(|| {
        CoreError::Conflict("Import job is no longer eligible for rollback".into())
    })?;

    tracing::info!(
        job_id,
        deleted_count = rolled.deleted_count,
        "Import job rolled back"
    );
    ctx.audit(audit_entry(
        actor,
        Some(rolled.job.organization_id),
        action_types::IMPORT_JOB_ROLLBACK,
        entity_types::IMPORT_JOB,
        Some(job_id),
        json!({ "deleted_count": rolled.deleted_count, "reason": reason }),
    ))
    .await;

    Ok(RollbackOutcome {
        success: true,
        deleted_count: rolled.deleted_count,
    })
}
