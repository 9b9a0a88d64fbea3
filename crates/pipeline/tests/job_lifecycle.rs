mod common;

use assert_matches::assert_matches;
use chrono::Duration;
use sheetport_core::error::CoreError;
use sheetport_core::imports::job::{ImportJobStatus, ImportLane, SourceType};
use sheetport_db::models::import_job::{CreateImportJob, ImportJobQuery};
use sheetport_pipeline::jobs::{
    create_job, get_job, list_job_errors, list_jobs, update_job_status, StatusUpdate,
};
use sheetport_pipeline::PipelineError;

use common::*;

fn batch_request(template_id: Option<i64>) -> CreateImportJob {
    CreateImportJob {
        organization_id: ORG,
        source_type: SourceType::Csv,
        lane: ImportLane::Batch,
        source_file_key: format!("imports/{ORG}/abc123-members.csv"),
        source_file_hash: HASH.into(),
        source_row_count: Some(20_000),
        target_form_id: None,
        mapping_template_id: template_id,
    }
}

fn cancel() -> StatusUpdate {
    StatusUpdate {
        status: ImportJobStatus::Cancelled,
        stats: None,
        error_summary: None,
    }
}

#[tokio::test]
async fn batch_job_without_template_is_rejected_before_persisting() {
    let h = Harness::new();

    let err = create_job(&h.ctx, &MEMBER, batch_request(None))
        .await
        .unwrap_err();
    assert_matches!(
        err,
        PipelineError::Core(CoreError::Validation(msg))
            if msg == "Batch imports require a mapping template"
    );
    assert_eq!(h.store.job_count().await, 0);
    assert!(h.audit.entries().await.is_empty());
}

#[tokio::test]
async fn malformed_hash_is_rejected() {
    let h = Harness::new();
    let form_id = h.member_form(ORG).await;
    let mut request = batch_request(None);
    request.lane = ImportLane::Interactive;
    request.target_form_id = Some(form_id);
    request.source_file_hash = "abc".into();

    let err = create_job(&h.ctx, &MEMBER, request).await.unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::Validation(_)));
    assert_eq!(h.store.job_count().await, 0);
}

#[tokio::test]
async fn new_job_is_pending_with_a_rollback_window() {
    let h = Harness::new();
    let form_id = h.member_form(ORG).await;
    let job = h.interactive_job(form_id).await;

    assert_eq!(job.status().unwrap(), ImportJobStatus::Pending);
    assert_eq!(job.version, 0);
    assert!(job.can_rollback);
    assert_eq!(job.created_by, Some(MEMBER.user_id));
    let window = job.rollback_before - job.created_at;
    assert!(window > Duration::days(6) && window <= Duration::days(7));
}

#[tokio::test]
async fn creating_in_a_foreign_organization_is_forbidden() {
    let h = Harness::new();
    let mut request = batch_request(None);
    request.organization_id = OTHER_ORG;

    let err = create_job(&h.ctx, &MEMBER, request).await.unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::Forbidden(_)));
}

#[tokio::test]
async fn target_form_must_belong_to_the_organization() {
    let h = Harness::new();
    let foreign_form = h.member_form(OTHER_ORG).await;
    let mut request = batch_request(None);
    request.lane = ImportLane::Interactive;
    request.target_form_id = Some(foreign_form);

    let err = create_job(&h.ctx, &MEMBER, request).await.unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::Forbidden(_)));
}

#[tokio::test]
async fn cancelling_is_terminal() {
    let h = Harness::new();
    let form_id = h.member_form(ORG).await;
    let job = h.interactive_job(form_id).await;

    let cancelled = update_job_status(&h.ctx, &MEMBER, job.id, cancel())
        .await
        .unwrap();
    assert_eq!(cancelled.status().unwrap(), ImportJobStatus::Cancelled);
    assert_eq!(cancelled.version, job.version + 1);
    assert!(cancelled.completed_at.is_some());

    let err = update_job_status(&h.ctx, &MEMBER, job.id, cancel())
        .await
        .unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::Conflict(_)));
}

#[tokio::test]
async fn rolled_back_is_not_reachable_through_status_updates() {
    let h = Harness::new();
    let form_id = h.member_form(ORG).await;
    let job = h.interactive_job(form_id).await;

    let update = StatusUpdate {
        status: ImportJobStatus::RolledBack,
        stats: None,
        error_summary: None,
    };
    let err = update_job_status(&h.ctx, &MEMBER, job.id, update)
        .await
        .unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::Validation(_)));
}

#[tokio::test]
async fn skipping_states_is_a_conflict() {
    let h = Harness::new();
    let form_id = h.member_form(ORG).await;
    let job = h.interactive_job(form_id).await;

    let update = StatusUpdate {
        status: ImportJobStatus::Completed,
        stats: None,
        error_summary: None,
    };
    let err = update_job_status(&h.ctx, &MEMBER, job.id, update)
        .await
        .unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::Conflict(_)));
}

#[tokio::test]
async fn listing_is_scoped_to_visible_organizations() {
    let h = Harness::new();
    let form_id = h.member_form(ORG).await;
    h.interactive_job(form_id).await;
    h.interactive_job(form_id).await;

    let member_view = list_jobs(&h.ctx, &MEMBER, &ImportJobQuery::default())
        .await
        .unwrap();
    assert_eq!(member_view.len(), 2);

    let outsider_view = list_jobs(&h.ctx, &OUTSIDER, &ImportJobQuery::default())
        .await
        .unwrap();
    assert!(outsider_view.is_empty());

    let admin_view = list_jobs(&h.ctx, &ADMIN, &ImportJobQuery::default())
        .await
        .unwrap();
    assert_eq!(admin_view.len(), 2);

    let filtered = ImportJobQuery {
        organization_id: Some(ORG),
        ..Default::default()
    };
    let err = list_jobs(&h.ctx, &OUTSIDER, &filtered).await.unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::Forbidden(_)));
}

#[tokio::test]
async fn get_job_distinguishes_missing_from_forbidden() {
    let h = Harness::new();
    let form_id = h.member_form(ORG).await;
    let job = h.interactive_job(form_id).await;

    assert!(get_job(&h.ctx, &MEMBER, 999).await.unwrap().is_none());
    assert_eq!(
        get_job(&h.ctx, &MEMBER, job.id).await.unwrap().map(|j| j.id),
        Some(job.id)
    );
    let err = get_job(&h.ctx, &OUTSIDER, job.id).await.unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::Forbidden(_)));
}

#[tokio::test]
async fn job_errors_are_listed_highest_row_first() {
    use sheetport_pipeline::interactive::{run_interactive, InteractiveRunRequest};

    let h = Harness::new();
    let form_id = h.member_form(ORG).await;
    let job = h.interactive_job(form_id).await;
    run_interactive(
        &h.ctx,
        &MEMBER,
        InteractiveRunRequest {
            job_id: job.id,
            form_id,
            mapping: member_mapping(),
            rows: vec![
                row("A", "a@club.test", "x"),
                row("B", "b@club.test", "1"),
                row("C", "c@club.test", "y"),
            ],
        },
    )
    .await
    .unwrap();

    let errors = list_job_errors(&h.ctx, &MEMBER, job.id, None, None)
        .await
        .unwrap();
    let rows: Vec<i32> = errors.iter().map(|e| e.row_number).collect();
    assert_eq!(rows, vec![3, 1]);

    let page = list_job_errors(&h.ctx, &MEMBER, job.id, Some(1), Some(1))
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].row_number, 1);
}
