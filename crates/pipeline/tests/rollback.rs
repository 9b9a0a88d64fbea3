mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use sheetport_core::audit::action_types;
use sheetport_core::error::CoreError;
use sheetport_core::imports::job::ImportJobStatus;
use sheetport_db::models::import_job::ImportJob;
use sheetport_pipeline::interactive::{run_interactive, InteractiveRunRequest};
use sheetport_pipeline::jobs::load_job;
use sheetport_pipeline::rollback::rollback_job;
use sheetport_pipeline::PipelineError;

use common::*;

async fn completed_job(h: &Harness) -> ImportJob {
    let form_id = h.member_form(ORG).await;
    let job = h.interactive_job(form_id).await;
    run_interactive(
        &h.ctx,
        &MEMBER,
        InteractiveRunRequest {
            job_id: job.id,
            form_id,
            mapping: member_mapping(),
            rows: member_rows(),
        },
    )
    .await
    .unwrap();
    job
}

#[tokio::test]
async fn rollback_deletes_job_submissions_once() {
    let h = Harness::new();
    let job = completed_job(&h).await;
    assert_eq!(h.store.submissions().await.len(), 2);
    assert_eq!(h.store.submission_versions().await.len(), 2);

    let outcome = rollback_job(&h.ctx, &MEMBER, job.id, Some("wrong file".into()))
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.deleted_count, 2);
    assert!(h.store.submissions().await.is_empty());
    assert!(h.store.submission_versions().await.is_empty());

    let rolled = load_job(h.ctx.store.as_ref(), job.id).await.unwrap();
    assert_eq!(rolled.status().unwrap(), ImportJobStatus::RolledBack);
    assert!(!rolled.can_rollback);

    let errors = h.store.job_errors(job.id).await;
    assert_eq!(errors.len(), 1);
    assert!(errors[0].raw_value.is_none());

    let err = rollback_job(&h.ctx, &MEMBER, job.id, None).await.unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::Forbidden(msg)) if msg.contains("disabled"));

    let entries = h.audit.entries().await;
    let rollback = entries
        .iter()
        .find(|e| e.action_type == action_types::IMPORT_JOB_ROLLBACK)
        .unwrap();
    let details = rollback.details_json.as_ref().unwrap();
    assert_eq!(details["deleted_count"], 2);
    assert_eq!(details["reason"], "wrong file");
}

#[tokio::test]
async fn expired_window_is_forbidden_and_deletes_nothing() {
    let h = Harness::new();
    let job = completed_job(&h).await;
    h.store
        .set_rollback_before(job.id, Utc::now() - Duration::hours(1))
        .await;

    let err = rollback_job(&h.ctx, &MEMBER, job.id, None).await.unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::Forbidden(msg)) if msg.contains("expired"));

    assert_eq!(h.store.submissions().await.len(), 2);
    let job = load_job(h.ctx.store.as_ref(), job.id).await.unwrap();
    assert_eq!(job.status().unwrap(), ImportJobStatus::Completed);
}

#[tokio::test]
async fn pending_job_cannot_be_rolled_back() {
    let h = Harness::new();
    let form_id = h.member_form(ORG).await;
    let job = h.interactive_job(form_id).await;

    let err = rollback_job(&h.ctx, &MEMBER, job.id, None).await.unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::Conflict(_)));
}

#[tokio::test]
async fn rollback_requires_organization_access() {
    let h = Harness::new();
    let job = completed_job(&h).await;

    let err = rollback_job(&h.ctx, &OUTSIDER, job.id, None).await.unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::Forbidden(_)));
    assert_eq!(h.store.submissions().await.len(), 2);

    rollback_job(&h.ctx, &ADMIN, job.id, None).await.unwrap();
    assert!(h.store.submissions().await.is_empty());
}

#[tokio::test]
async fn missing_job_is_not_found() {
    let h = Harness::new();
    let err = rollback_job(&h.ctx, &MEMBER, 999, None).await.unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::NotFound { .. }));
}
