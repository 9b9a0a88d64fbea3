mod common;

use assert_matches::assert_matches;
use serde_json::json;
use sheetport_core::audit::action_types;
use sheetport_core::error::CoreError;
use sheetport_core::imports::analyzer::ErrorCategory;
use sheetport_core::imports::job::{ImportJobStatus, ImportLane, SourceType};
use sheetport_core::imports::template_file::{TemplateFormat, TemplateOptions};
use sheetport_core::types::DbId;
use sheetport_db::models::import_job::CreateImportJob;
use sheetport_db::models::mapping_template::{
    CreateMappingTemplate, MappingTemplate, UpdateMappingTemplate,
};
use sheetport_pipeline::batch::run_batch;
use sheetport_pipeline::jobs::{create_job, load_job};
use sheetport_pipeline::ports::BatchDispatch;
use sheetport_pipeline::preview::{apply_fix, preview_import, ApplyFixRequest, PreviewRequest};
use sheetport_pipeline::templates::{
    create_template, delete_template, download_template, list_templates, update_template,
    TemplateDownloadRequest,
};
use sheetport_pipeline::uploads::{create_upload, UploadRequest};
use sheetport_pipeline::PipelineError;

use common::*;

fn template_input(organization_id: Option<DbId>, form_id: DbId) -> CreateMappingTemplate {
    CreateMappingTemplate {
        organization_id,
        name: "  Member roster  ".into(),
        description: Some("Annual membership export".into()),
        target_form_id: Some(form_id),
        target_form_version_id: None,
        mappings: json!({
            "Full Name": "fullName",
            "Email": "email",
            "Dues Paid": "amountPaid",
        }),
    }
}

async fn org_template(h: &Harness, form_id: DbId) -> MappingTemplate {
    create_template(&h.ctx, &MEMBER, template_input(Some(ORG), form_id))
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Mapping templates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn global_templates_need_an_administrator() {
    let h = Harness::new();
    let form_id = h.member_form(ORG).await;

    let err = create_template(&h.ctx, &MEMBER, template_input(None, form_id))
        .await
        .unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::Forbidden(_)));

    let global = create_template(&h.ctx, &ADMIN, template_input(None, form_id))
        .await
        .unwrap();
    assert!(global.organization_id.is_none());

    let err = delete_template(&h.ctx, &MEMBER, global.id).await.unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::Forbidden(_)));
}

#[tokio::test]
async fn template_lifecycle_is_audited() {
    let h = Harness::new();
    let form_id = h.member_form(ORG).await;
    let template = org_template(&h, form_id).await;
    assert_eq!(template.name, "Member roster");

    let updated = update_template(
        &h.ctx,
        &MEMBER,
        template.id,
        UpdateMappingTemplate {
            name: Some("Roster 2026".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.name, "Roster 2026");
    assert_eq!(updated.mappings, template.mappings);

    delete_template(&h.ctx, &MEMBER, template.id).await.unwrap();
    let err = delete_template(&h.ctx, &MEMBER, template.id).await.unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::NotFound { .. }));

    assert_eq!(
        h.audit.actions().await,
        vec![
            action_types::IMPORT_TEMPLATE_CREATE,
            action_types::IMPORT_TEMPLATE_UPDATE,
            action_types::IMPORT_TEMPLATE_DELETE,
        ]
    );
}

#[tokio::test]
async fn malformed_mappings_are_rejected() {
    let h = Harness::new();
    let form_id = h.member_form(ORG).await;
    let mut input = template_input(Some(ORG), form_id);
    input.mappings = json!(["Full Name", "fullName"]);

    let err = create_template(&h.ctx, &MEMBER, input).await.unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::Validation(_)));
}

#[tokio::test]
async fn organization_listing_includes_global_templates() {
    let h = Harness::new();
    let form_id = h.member_form(ORG).await;
    org_template(&h, form_id).await;
    create_template(&h.ctx, &ADMIN, template_input(None, form_id))
        .await
        .unwrap();
    create_template(&h.ctx, &OUTSIDER, template_input(Some(OTHER_ORG), form_id))
        .await
        .unwrap();

    let listed = list_templates(&h.ctx, &MEMBER, Some(ORG)).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed
        .iter()
        .all(|t| t.organization_id.map_or(true, |id| id == ORG)));

    let unscoped = list_templates(&h.ctx, &MEMBER, None).await.unwrap();
    assert_eq!(unscoped.len(), 1);
    let everything = list_templates(&h.ctx, &ADMIN, None).await.unwrap();
    assert_eq!(everything.len(), 3);
}

// ---------------------------------------------------------------------------
// Batch lane
// ---------------------------------------------------------------------------

async fn batch_job(h: &Harness, form_id: DbId, template_id: DbId) -> sheetport_db::models::import_job::ImportJob {
    create_job(
        &h.ctx,
        &MEMBER,
        CreateImportJob {
            organization_id: ORG,
            source_type: SourceType::Csv,
            lane: ImportLane::Batch,
            source_file_key: format!("imports/{ORG}/f00d-members.csv"),
            source_file_hash: HASH.into(),
            source_row_count: Some(3),
            target_form_id: Some(form_id),
            mapping_template_id: Some(template_id),
        },
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn batch_run_validates_and_queues() {
    let h = Harness::new();
    let form_id = h.member_form(ORG).await;
    let template = org_template(&h, form_id).await;
    let job = batch_job(&h, form_id, template.id).await;

    let outcome = run_batch(&h.ctx, &MEMBER, job.id).await.unwrap();
    assert_eq!(outcome.dispatch, BatchDispatch::Queued);
    assert_eq!(outcome.job.status().unwrap(), ImportJobStatus::Validated);
    assert_eq!(outcome.job.version, 2);
    assert!(outcome.job.started_at.is_some());

    let err = run_batch(&h.ctx, &MEMBER, job.id).await.unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::Conflict(_)));
}

#[tokio::test]
async fn batch_source_outside_the_organization_prefix_is_rejected() {
    let h = Harness::new();
    let form_id = h.member_form(ORG).await;
    let template = org_template(&h, form_id).await;

    let err = create_job(
        &h.ctx,
        &MEMBER,
        CreateImportJob {
            organization_id: ORG,
            source_type: SourceType::Csv,
            lane: ImportLane::Batch,
            source_file_key: format!("imports/{OTHER_ORG}/f00d-members.csv"),
            source_file_hash: HASH.into(),
            source_row_count: None,
            target_form_id: Some(form_id),
            mapping_template_id: Some(template.id),
        },
    )
    .await
    .unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::Validation(_)));
}

#[tokio::test]
async fn batch_run_after_template_deletion_fails_validation() {
    let h = Harness::new();
    let form_id = h.member_form(ORG).await;
    let template = org_template(&h, form_id).await;
    let job = batch_job(&h, form_id, template.id).await;
    delete_template(&h.ctx, &MEMBER, template.id).await.unwrap();

    let err = run_batch(&h.ctx, &MEMBER, job.id).await.unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::Validation(_)));
    let job = load_job(h.ctx.store.as_ref(), job.id).await.unwrap();
    assert_eq!(job.status().unwrap(), ImportJobStatus::Pending);
}

#[tokio::test]
async fn interactive_job_is_not_a_batch_job() {
    let h = Harness::new();
    let form_id = h.member_form(ORG).await;
    let job = h.interactive_job(form_id).await;

    let err = run_batch(&h.ctx, &MEMBER, job.id).await.unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::Validation(_)));
}

// ---------------------------------------------------------------------------
// Uploads and template files
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upload_ticket_is_scoped_to_the_organization() {
    let h = Harness::new();
    let request = UploadRequest {
        organization_id: ORG,
        file_name: "Spring Roster.csv".into(),
        content_type: "text/csv".into(),
        size_bytes: 2048,
    };

    let ticket = create_upload(&h.ctx, &MEMBER, &request).await.unwrap();
    assert!(ticket.storage_key.starts_with(&format!("imports/{ORG}/")));
    assert!(ticket.upload_url.contains(&ticket.storage_key));
    assert!(ticket.expires_at > chrono::Utc::now());

    let audit = h.audit.entries().await;
    assert_eq!(audit.len(), 1);
    let details = audit[0].details_json.as_ref().unwrap();
    assert!(details.get("upload_url").is_none());

    let err = create_upload(&h.ctx, &OUTSIDER, &request).await.unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::Forbidden(_)));
}

#[tokio::test]
async fn downloaded_csv_template_lists_field_labels() {
    let h = Harness::new();
    let form_id = h.member_form(ORG).await;

    let file = download_template(
        &h.ctx,
        &MEMBER,
        &TemplateDownloadRequest {
            form_id,
            format: TemplateFormat::Csv,
            options: TemplateOptions::default(),
            organization_id: Some(ORG),
            mapping_template_id: None,
        },
    )
    .await
    .unwrap();

    let text = String::from_utf8(file.bytes).unwrap();
    let header = text.lines().next().unwrap();
    assert!(header.contains("Full Name"));
    assert!(header.contains("Dues Paid"));
    assert!(file.file_name.ends_with(".csv"));
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

#[tokio::test]
async fn preview_groups_the_invalid_number_under_its_column() {
    let h = Harness::new();
    let form_id = h.member_form(ORG).await;

    let report = preview_import(
        &h.ctx,
        &MEMBER,
        PreviewRequest {
            organization_id: ORG,
            form_id,
            headers: headers(),
            rows: member_rows(),
            overrides: member_mapping(),
            mapping_template_id: None,
            known_references: Default::default(),
        },
    )
    .await
    .unwrap();

    assert_eq!(report.mapping, member_mapping());
    let quality: Vec<_> = report
        .analysis
        .errors
        .iter()
        .filter(|e| e.category == ErrorCategory::DataQuality)
        .collect();
    assert_eq!(quality.len(), 1);
    assert_eq!(quality[0].affected_rows, vec![3]);
    assert_eq!(quality[0].affected_columns, vec!["Dues Paid".to_string()]);
    assert_eq!(report.analysis.stats.error_rows, 1);

    assert_eq!(report.rows.len(), 3);
    assert!(report.rows[0].errors.is_empty());
    assert_eq!(report.rows[2].errors.len(), 1);
}

#[tokio::test]
async fn whitespace_fix_trims_the_flagged_column() {
    let h = Harness::new();
    let form_id = h.member_form(ORG).await;
    let rows = vec![row(" Ada Lovelace ", "ada@club.test", "120")];

    let report = preview_import(
        &h.ctx,
        &MEMBER,
        PreviewRequest {
            organization_id: ORG,
            form_id,
            headers: headers(),
            rows: rows.clone(),
            overrides: member_mapping(),
            mapping_template_id: None,
            known_references: Default::default(),
        },
    )
    .await
    .unwrap();

    let warning = report
        .analysis
        .warnings
        .iter()
        .find(|w| w.code == "WHITESPACE")
        .cloned()
        .unwrap();
    let fixed = apply_fix(ApplyFixRequest {
        rows,
        mapping: report.mapping,
        error: warning,
    })
    .unwrap();

    assert_eq!(fixed.rows[0]["Full Name"], "Ada Lovelace");
    assert_eq!(fixed.changes.len(), 1);
    assert_eq!(fixed.changes[0].row, 1);
}
