//! Postgres adapters delegating to the `sheetport-db` repositories.

use async_trait::async_trait;
use sheetport_core::error::CoreError;
use sheetport_core::imports::job::{ImportJobStatus, ImportStats};
use sheetport_core::roles::is_global_admin;
use sheetport_core::types::{DbId, Timestamp};
use sheetport_db::models::audit::CreateAuditLog;
use sheetport_db::models::form::{Form, FormVersion};
use sheetport_db::models::import_job::{ImportJob, ImportJobQuery, JobChanges, NewImportJob};
use sheetport_db::models::import_job_error::{CreateImportJobError, ImportJobError};
use sheetport_db::models::mapping_template::{
    CreateMappingTemplate, MappingTemplate, UpdateMappingTemplate,
};
use sheetport_db::models::submission::{CreateFormSubmission, FormSubmission};
use sheetport_db::repositories::{
    AuditLogRepo, FormRepo, ImportJobErrorRepo, ImportJobRepo, MappingTemplateRepo,
    OrganizationMemberRepo, RolledBackJob, SubmissionRepo, UserRepo,
};
use sheetport_db::DbPool;

use crate::context::Actor;
use crate::error::PipelineError;
use crate::ports::{AccessGuard, AuditSink, ImportStore, TemplateScope};

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgImportStore {
    pool: DbPool,
}

impl PgImportStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImportStore for PgImportStore {
    async fn create_job(&self, input: &NewImportJob) -> Result<ImportJob, sqlx::Error> {
        ImportJobRepo::create(&self.pool, input).await
    }

    async fn find_job(&self, id: DbId) -> Result<Option<ImportJob>, sqlx::Error> {
        ImportJobRepo::find_by_id(&self.pool, id).await
    }

    async fn transition_job(
        &self,
        id: DbId,
        expected_version: i64,
        from: ImportJobStatus,
        to: ImportJobStatus,
        changes: &JobChanges,
    ) -> Result<Option<ImportJob>, sqlx::Error> {
        ImportJobRepo::transition(&self.pool, id, expected_version, from, to, changes).await
    }

    async fn record_progress(
        &self,
        id: DbId,
        expected_version: i64,
        checkpoint: i32,
        stats: &ImportStats,
    ) -> Result<Option<ImportJob>, sqlx::Error> {
        ImportJobRepo::record_progress(&self.pool, id, expected_version, checkpoint, &stats.to_json())
            .await
    }

    async fn claim_next_batch(&self) -> Result<Option<ImportJob>, sqlx::Error> {
        ImportJobRepo::claim_next_batch(&self.pool).await
    }

    async fn rollback_job(
        &self,
        id: DbId,
        now: Timestamp,
    ) -> Result<Option<RolledBackJob>, sqlx::Error> {
        ImportJobRepo::rollback(&self.pool, id, now).await
    }

    async fn list_jobs(
        &self,
        organization_ids: Option<&[DbId]>,
        query: &ImportJobQuery,
    ) -> Result<Vec<ImportJob>, sqlx::Error> {
        ImportJobRepo::list(&self.pool, organization_ids, query).await
    }

    async fn insert_job_errors(
        &self,
        job_id: DbId,
        errors: &[CreateImportJobError],
    ) -> Result<u64, sqlx::Error> {
        ImportJobErrorRepo::batch_insert(&self.pool, job_id, errors).await
    }

    async fn list_job_errors(
        &self,
        job_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<ImportJobError>, sqlx::Error> {
        ImportJobErrorRepo::list_by_job(&self.pool, job_id, limit, offset).await
    }

    async fn create_template(
        &self,
        created_by: DbId,
        input: &CreateMappingTemplate,
    ) -> Result<MappingTemplate, sqlx::Error> {
        MappingTemplateRepo::create(&self.pool, created_by, input).await
    }

    async fn find_template(&self, id: DbId) -> Result<Option<MappingTemplate>, sqlx::Error> {
        MappingTemplateRepo::find_by_id(&self.pool, id).await
    }

    async fn update_template(
        &self,
        id: DbId,
        input: &UpdateMappingTemplate,
    ) -> Result<Option<MappingTemplate>, sqlx::Error> {
        MappingTemplateRepo::update(&self.pool, id, input).await
    }

    async fn delete_template(&self, id: DbId) -> Result<bool, sqlx::Error> {
        MappingTemplateRepo::delete(&self.pool, id).await
    }

    async fn list_templates(
        &self,
        scope: TemplateScope,
    ) -> Result<Vec<MappingTemplate>, sqlx::Error> {
        match scope {
            TemplateScope::Organization(id) => {
                MappingTemplateRepo::list_for_organization(&self.pool, id).await
            }
            TemplateScope::Global => MappingTemplateRepo::list_unscoped(&self.pool, false).await,
            TemplateScope::All => MappingTemplateRepo::list_unscoped(&self.pool, true).await,
        }
    }

    async fn find_form(&self, id: DbId) -> Result<Option<Form>, sqlx::Error> {
        FormRepo::find_by_id(&self.pool, id).await
    }

    async fn latest_form_version(
        &self,
        form_id: DbId,
    ) -> Result<Option<FormVersion>, sqlx::Error> {
        FormRepo::latest_published_version(&self.pool, form_id).await
    }

    async fn insert_submission(
        &self,
        input: &CreateFormSubmission,
    ) -> Result<FormSubmission, sqlx::Error> {
        SubmissionRepo::create_with_version(&self.pool, input).await
    }

    async fn count_job_submissions(&self, job_id: DbId) -> Result<i64, sqlx::Error> {
        SubmissionRepo::count_by_job(&self.pool, job_id).await
    }
}

// ---------------------------------------------------------------------------
// Access
// ---------------------------------------------------------------------------

/// Membership-table authorization; `users.role = 'admin'` sees everything.
#[derive(Clone)]
pub struct PgAccessGuard {
    pool: DbPool,
}

impl PgAccessGuard {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccessGuard for PgAccessGuard {
    async fn is_global_admin(&self, actor: &Actor) -> Result<bool, PipelineError> {
        let role = UserRepo::find_role(&self.pool, actor.user_id).await?;
        Ok(role.as_deref().is_some_and(is_global_admin))
    }

    async fn organization_ids(&self, actor: &Actor) -> Result<Vec<DbId>, PipelineError> {
        Ok(OrganizationMemberRepo::organization_ids_for_user(&self.pool, actor.user_id).await?)
    }

    async fn require_org_access(
        &self,
        actor: &Actor,
        organization_id: DbId,
    ) -> Result<(), PipelineError> {
        if self.is_global_admin(actor).await? {
            return Ok(());
        }
        if OrganizationMemberRepo::is_active_member(&self.pool, organization_id, actor.user_id)
            .await?
        {
            return Ok(());
        }
        Err(CoreError::Forbidden("You do not have access to this organization".into()).into())
    }
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgAuditSink {
    pool: DbPool,
}

impl PgAuditSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn record(&self, entry: CreateAuditLog) -> Result<(), PipelineError> {
        AuditLogRepo::insert(&self.pool, &entry).await?;
        Ok(())
    }
}
