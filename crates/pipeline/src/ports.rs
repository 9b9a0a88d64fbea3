//! Collaborator interfaces the pipeline depends on.

use std::time::Duration;

use async_trait::async_trait;
use sheetport_core::imports::job::{ImportJobStatus, ImportStats};
use sheetport_core::types::{DbId, Timestamp};
use sheetport_db::models::audit::CreateAuditLog;
use sheetport_db::models::form::{Form, FormVersion};
use sheetport_db::models::import_job::{ImportJob, ImportJobQuery, JobChanges, NewImportJob};
use sheetport_db::models::import_job_error::{CreateImportJobError, ImportJobError};
use sheetport_db::models::mapping_template::{
    CreateMappingTemplate, MappingTemplate, UpdateMappingTemplate,
};
use sheetport_db::models::submission::{CreateFormSubmission, FormSubmission};
use sheetport_db::repositories::RolledBackJob;

use crate::context::Actor;
use crate::error::PipelineError;

/// Which templates a listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateScope {
    /// One organization's templates plus global ones.
    Organization(DbId),
    Global,
    All,
}

/// Persistence for jobs, errors, templates, forms and submissions.
///
/// Methods returning `Option` yield `None` when a conditional write found
/// no matching row.
#[async_trait]
pub trait ImportStore: Send + Sync {
    async fn create_job(&self, input: &NewImportJob) -> Result<ImportJob, sqlx::Error>;
    async fn find_job(&self, id: DbId) -> Result<Option<ImportJob>, sqlx::Error>;
    async fn transition_job(
        &self,
        id: DbId,
        expected_version: i64,
        from: ImportJobStatus,
        to: ImportJobStatus,
        changes: &JobChanges,
    ) -> Result<Option<ImportJob>, sqlx::Error>;
    async fn record_progress(
        &self,
        id: DbId,
        expected_version: i64,
        checkpoint: i32,
        stats: &ImportStats,
    ) -> Result<Option<ImportJob>, sqlx::Error>;
    async fn claim_next_batch(&self) -> Result<Option<ImportJob>, sqlx::Error>;
    async fn rollback_job(
        &self,
        id: DbId,
        now: Timestamp,
    ) -> Result<Option<RolledBackJob>, sqlx::Error>;
    async fn list_jobs(
        &self,
        organization_ids: Option<&[DbId]>,
        query: &ImportJobQuery,
    ) -> Result<Vec<ImportJob>, sqlx::Error>;

    async fn insert_job_errors(
        &self,
        job_id: DbId,
        errors: &[CreateImportJobError],
    ) -> Result<u64, sqlx::Error>;
    async fn list_job_errors(
        &self,
        job_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<ImportJobError>, sqlx::Error>;

    async fn create_template(
        &self,
        created_by: DbId,
        input: &CreateMappingTemplate,
    ) -> Result<MappingTemplate, sqlx::Error>;
    async fn find_template(&self, id: DbId) -> Result<Option<MappingTemplate>, sqlx::Error>;
    async fn update_template(
        &self,
        id: DbId,
        input: &UpdateMappingTemplate,
    ) -> Result<Option<MappingTemplate>, sqlx::Error>;
    async fn delete_template(&self, id: DbId) -> Result<bool, sqlx::Error>;
    async fn list_templates(&self, scope: TemplateScope)
        -> Result<Vec<MappingTemplate>, sqlx::Error>;

    async fn find_form(&self, id: DbId) -> Result<Option<Form>, sqlx::Error>;
    async fn latest_form_version(&self, form_id: DbId)
        -> Result<Option<FormVersion>, sqlx::Error>;

    async fn insert_submission(
        &self,
        input: &CreateFormSubmission,
    ) -> Result<FormSubmission, sqlx::Error>;
    async fn count_job_submissions(&self, job_id: DbId) -> Result<i64, sqlx::Error>;
}

/// Organization-scoped authorization.
#[async_trait]
pub trait AccessGuard: Send + Sync {
    async fn is_global_admin(&self, actor: &Actor) -> Result<bool, PipelineError>;

    /// Organizations the actor is an active member of.
    async fn organization_ids(&self, actor: &Actor) -> Result<Vec<DbId>, PipelineError>;

    /// `Forbidden` unless the actor is a member of `organization_id` or a
    /// global admin.
    async fn require_org_access(
        &self,
        actor: &Actor,
        organization_id: DbId,
    ) -> Result<(), PipelineError>;
}

/// Object storage for uploaded sources and error reports.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// A URL the client can PUT the object to until `expires_in` elapses.
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> Result<String, PipelineError>;

    async fn get_object(&self, key: &str) -> Result<Vec<u8>, PipelineError>;

    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), PipelineError>;
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: CreateAuditLog) -> Result<(), PipelineError>;
}

/// What a dispatcher did with a validated batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchDispatch {
    /// Left in `validated` for a worker to claim.
    Queued,
    /// Processing started in this process.
    Started,
}

/// Hands a validated batch job to whatever processes it.
#[async_trait]
pub trait BatchDispatcher: Send + Sync {
    async fn dispatch(&self, job: &ImportJob) -> Result<BatchDispatch, PipelineError>;
}
