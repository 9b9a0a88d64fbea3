//! In-process adapters. They honour the same conditional-write semantics as
//! the Postgres store so pipeline behaviour can be exercised without a
//! database.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sheetport_core::error::CoreError;
use sheetport_core::imports::job::{ImportJobStatus, ImportLane, ImportStats};
use sheetport_core::types::{DbId, Timestamp};
use sheetport_db::models::audit::CreateAuditLog;
use sheetport_db::models::form::{Form, FormVersion};
use sheetport_db::models::import_job::{ImportJob, ImportJobQuery, JobChanges, NewImportJob};
use sheetport_db::models::import_job_error::{CreateImportJobError, ImportJobError};
use sheetport_db::models::mapping_template::{
    CreateMappingTemplate, MappingTemplate, UpdateMappingTemplate,
};
use sheetport_db::models::submission::{
    CreateFormSubmission, FormSubmission, FormSubmissionVersion,
};
use sheetport_db::repositories::RolledBackJob;
use tokio::sync::RwLock;

use crate::context::Actor;
use crate::error::PipelineError;
use crate::ports::{AccessGuard, AuditSink, ImportStore, ObjectStorage, TemplateScope};

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreState {
    next_id: DbId,
    jobs: BTreeMap<DbId, ImportJob>,
    errors: Vec<ImportJobError>,
    templates: BTreeMap<DbId, MappingTemplate>,
    forms: BTreeMap<DbId, Form>,
    versions: Vec<FormVersion>,
    submissions: Vec<FormSubmission>,
    submission_versions: Vec<FormSubmissionVersion>,
}

impl StoreState {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

pub struct MemoryImportStore {
    state: RwLock<StoreState>,
    /// Submission inserts left before every further insert fails.
    submission_budget: AtomicUsize,
    /// Submission inserts left before the running job is cancelled.
    cancel_budget: AtomicUsize,
}

impl MemoryImportStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            submission_budget: AtomicUsize::new(usize::MAX),
            cancel_budget: AtomicUsize::new(usize::MAX),
        }
    }

    /// Seed a form with one published version.
    pub async fn insert_form(
        &self,
        organization_id: DbId,
        name: &str,
        definition: serde_json::Value,
    ) -> (Form, FormVersion) {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let form = Form {
            id: state.next_id(),
            organization_id,
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        let version = FormVersion {
            id: state.next_id(),
            form_id: form.id,
            version_number: 1,
            definition,
            published_at: Some(now),
            created_at: now,
            updated_at: now,
        };
        state.forms.insert(form.id, form.clone());
        state.versions.push(version.clone());
        (form, version)
    }

    /// Move a job's rollback deadline, e.g. into the past.
    pub async fn set_rollback_before(&self, job_id: DbId, rollback_before: Timestamp) {
        if let Some(job) = self.state.write().await.jobs.get_mut(&job_id) {
            job.rollback_before = rollback_before;
        }
    }

    /// Allow `remaining` more submission inserts, then fail with a pool
    /// timeout as an unreachable database would.
    pub fn fail_submissions_after(&self, remaining: usize) {
        self.submission_budget.store(remaining, Ordering::SeqCst);
    }

    /// After `remaining` more submission inserts, cancel the job being
    /// imported as a concurrent request would.
    pub fn cancel_job_after_submissions(&self, remaining: usize) {
        self.cancel_budget.store(remaining, Ordering::SeqCst);
    }

    pub async fn submissions(&self) -> Vec<FormSubmission> {
        self.state.read().await.submissions.clone()
    }

    pub async fn submission_versions(&self) -> Vec<FormSubmissionVersion> {
        self.state.read().await.submission_versions.clone()
    }

    pub async fn job_errors(&self, job_id: DbId) -> Vec<ImportJobError> {
        self.state
            .read()
            .await
            .errors
            .iter()
            .filter(|e| e.job_id == job_id)
            .cloned()
            .collect()
    }

    pub async fn job_count(&self) -> usize {
        self.state.read().await.jobs.len()
    }
}

impl Default for MemoryImportStore {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_changes(job: &mut ImportJob, changes: &JobChanges, now: Timestamp) {
    if let Some(stats) = &changes.stats {
        job.stats = stats.clone();
    }
    if let Some(summary) = &changes.error_summary {
        job.error_summary = summary.clone();
    }
    if let Some(key) = &changes.error_report_key {
        job.error_report_key = Some(key.clone());
    }
    if changes.set_started_at {
        job.started_at = Some(now);
    }
    if changes.set_completed_at {
        job.completed_at = Some(now);
    }
}

#[async_trait]
impl ImportStore for MemoryImportStore {
    async fn create_job(&self, input: &NewImportJob) -> Result<ImportJob, sqlx::Error> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let job = ImportJob {
            id: state.next_id(),
            organization_id: input.organization_id,
            source_type: input.source_type.as_str().to_string(),
            lane: input.lane.as_str().to_string(),
            status: ImportJobStatus::Pending.as_str().to_string(),
            source_file_key: input.source_file_key.clone(),
            source_file_hash: input.source_file_hash.clone(),
            source_row_count: input.source_row_count,
            target_form_id: input.target_form_id,
            mapping_template_id: input.mapping_template_id,
            stats: serde_json::json!({}),
            error_summary: serde_json::json!({}),
            progress_checkpoint: 0,
            error_report_key: None,
            can_rollback: true,
            rollback_before: input.rollback_before,
            version: 0,
            created_by: Some(input.created_by),
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        state.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn find_job(&self, id: DbId) -> Result<Option<ImportJob>, sqlx::Error> {
        Ok(self.state.read().await.jobs.get(&id).cloned())
    }

    async fn transition_job(
        &self,
        id: DbId,
        expected_version: i64,
        from: ImportJobStatus,
        to: ImportJobStatus,
        changes: &JobChanges,
    ) -> Result<Option<ImportJob>, sqlx::Error> {
        let mut state = self.state.write().await;
        let Some(job) = state.jobs.get_mut(&id) else {
            return Ok(None);
        };
        if job.version != expected_version || job.status != from.as_str() {
            return Ok(None);
        }
        let now = Utc::now();
        job.status = to.as_str().to_string();
        job.version += 1;
        job.updated_at = now;
        apply_changes(job, changes, now);
        Ok(Some(job.clone()))
    }

    async fn record_progress(
        &self,
        id: DbId,
        expected_version: i64,
        checkpoint: i32,
        stats: &ImportStats,
    ) -> Result<Option<ImportJob>, sqlx::Error> {
        let mut state = self.state.write().await;
        let Some(job) = state.jobs.get_mut(&id) else {
            return Ok(None);
        };
        if job.version != expected_version || job.status != ImportJobStatus::Importing.as_str() {
            return Ok(None);
        }
        job.progress_checkpoint = checkpoint;
        job.stats = stats.to_json();
        job.version += 1;
        job.updated_at = Utc::now();
        Ok(Some(job.clone()))
    }

    async fn claim_next_batch(&self) -> Result<Option<ImportJob>, sqlx::Error> {
        let mut state = self.state.write().await;
        let next = state
            .jobs
            .values_mut()
            .filter(|j| {
                j.status == ImportJobStatus::Validated.as_str()
                    && j.lane == ImportLane::Batch.as_str()
            })
            .min_by_key(|j| (j.created_at, j.id));
        let Some(job) = next else {
            return Ok(None);
        };
        let now = Utc::now();
        job.status = ImportJobStatus::Importing.as_str().to_string();
        job.version += 1;
        job.started_at.get_or_insert(now);
        job.updated_at = now;
        Ok(Some(job.clone()))
    }

    async fn rollback_job(
        &self,
        id: DbId,
        now: Timestamp,
    ) -> Result<Option<RolledBackJob>, sqlx::Error> {
        let mut state = self.state.write().await;
        let Some(job) = state.jobs.get_mut(&id) else {
            return Ok(None);
        };
        let eligible = job.status == ImportJobStatus::Completed.as_str()
            && job.can_rollback
            && job.rollback_before > now;
        if !eligible {
            return Ok(None);
        }
        job.status = ImportJobStatus::RolledBack.as_str().to_string();
        job.can_rollback = false;
        job.completed_at = Some(now);
        job.version += 1;
        job.updated_at = now;
        let job = job.clone();

        let before = state.submissions.len();
        state.submissions.retain(|s| s.import_job_id != Some(id));
        let deleted_count = (before - state.submissions.len()) as u64;
        let StoreState {
            submissions,
            submission_versions,
            ..
        } = &mut *state;
        submission_versions.retain(|v| submissions.iter().any(|s| s.id == v.submission_id));

        for error in state.errors.iter_mut().filter(|e| e.job_id == id) {
            error.raw_value = None;
        }

        Ok(Some(RolledBackJob { job, deleted_count }))
    }

    async fn list_jobs(
        &self,
        organization_ids: Option<&[DbId]>,
        query: &ImportJobQuery,
    ) -> Result<Vec<ImportJob>, sqlx::Error> {
        use sheetport_core::pagination::{
            clamp_limit, clamp_offset, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT,
        };
        let state = self.state.read().await;
        let mut jobs: Vec<ImportJob> = state
            .jobs
            .values()
            .filter(|j| organization_ids.map_or(true, |ids| ids.contains(&j.organization_id)))
            .filter(|j| query.status.map_or(true, |s| j.status == s.as_str()))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        let limit = clamp_limit(query.limit, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT) as usize;
        let offset = clamp_offset(query.offset) as usize;
        Ok(jobs.into_iter().skip(offset).take(limit).collect())
    }

    async fn insert_job_errors(
        &self,
        job_id: DbId,
        errors: &[CreateImportJobError],
    ) -> Result<u64, sqlx::Error> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        for error in errors {
            let id = state.next_id();
            state.errors.push(ImportJobError {
                id,
                job_id,
                row_number: error.row_number,
                field_key: error.field_key.clone(),
                error_type: error.error_type.clone(),
                error_message: error.error_message.clone(),
                raw_value: error.raw_value.clone(),
                created_at: now,
            });
        }
        Ok(errors.len() as u64)
    }

    async fn list_job_errors(
        &self,
        job_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<ImportJobError>, sqlx::Error> {
        use sheetport_core::pagination::{
            clamp_limit, clamp_offset, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT,
        };
        let mut errors = self.job_errors(job_id).await;
        errors.sort_by(|a, b| (b.row_number, b.id).cmp(&(a.row_number, a.id)));
        let limit = clamp_limit(limit, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT) as usize;
        let offset = clamp_offset(offset) as usize;
        Ok(errors.into_iter().skip(offset).take(limit).collect())
    }

    async fn create_template(
        &self,
        created_by: DbId,
        input: &CreateMappingTemplate,
    ) -> Result<MappingTemplate, sqlx::Error> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let template = MappingTemplate {
            id: state.next_id(),
            organization_id: input.organization_id,
            name: input.name.clone(),
            description: input.description.clone(),
            target_form_id: input.target_form_id,
            target_form_version_id: input.target_form_version_id,
            mappings: input.mappings.clone(),
            created_by: Some(created_by),
            created_at: now,
            updated_at: now,
        };
        state.templates.insert(template.id, template.clone());
        Ok(template)
    }

    async fn find_template(&self, id: DbId) -> Result<Option<MappingTemplate>, sqlx::Error> {
        Ok(self.state.read().await.templates.get(&id).cloned())
    }

    async fn update_template(
        &self,
        id: DbId,
        input: &UpdateMappingTemplate,
    ) -> Result<Option<MappingTemplate>, sqlx::Error> {
        let mut state = self.state.write().await;
        let Some(template) = state.templates.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = &input.name {
            template.name = name.clone();
        }
        if let Some(description) = &input.description {
            template.description = Some(description.clone());
        }
        if let Some(form_id) = input.target_form_id {
            template.target_form_id = Some(form_id);
        }
        if let Some(version_id) = input.target_form_version_id {
            template.target_form_version_id = Some(version_id);
        }
        if let Some(mappings) = &input.mappings {
            template.mappings = mappings.clone();
        }
        template.updated_at = Utc::now();
        Ok(Some(template.clone()))
    }

    async fn delete_template(&self, id: DbId) -> Result<bool, sqlx::Error> {
        let mut state = self.state.write().await;
        let removed = state.templates.remove(&id).is_some();
        if removed {
            for job in state.jobs.values_mut() {
                if job.mapping_template_id == Some(id) {
                    job.mapping_template_id = None;
                }
            }
        }
        Ok(removed)
    }

    async fn list_templates(
        &self,
        scope: TemplateScope,
    ) -> Result<Vec<MappingTemplate>, sqlx::Error> {
        let state = self.state.read().await;
        let mut templates: Vec<MappingTemplate> = state
            .templates
            .values()
            .filter(|t| match scope {
                TemplateScope::Organization(id) => {
                    t.organization_id.is_none() || t.organization_id == Some(id)
                }
                TemplateScope::Global => t.organization_id.is_none(),
                TemplateScope::All => true,
            })
            .cloned()
            .collect();
        templates.sort_by(|a, b| (&a.name, a.id).cmp(&(&b.name, b.id)));
        Ok(templates)
    }

    async fn find_form(&self, id: DbId) -> Result<Option<Form>, sqlx::Error> {
        Ok(self.state.read().await.forms.get(&id).cloned())
    }

    async fn latest_form_version(
        &self,
        form_id: DbId,
    ) -> Result<Option<FormVersion>, sqlx::Error> {
        Ok(self
            .state
            .read()
            .await
            .versions
            .iter()
            .filter(|v| v.form_id == form_id && v.published_at.is_some())
            .max_by_key(|v| v.version_number)
            .cloned())
    }

    async fn insert_submission(
        &self,
        input: &CreateFormSubmission,
    ) -> Result<FormSubmission, sqlx::Error> {
        let budget = self.submission_budget.load(Ordering::SeqCst);
        if budget == 0 {
            return Err(sqlx::Error::PoolTimedOut);
        }
        if budget != usize::MAX {
            self.submission_budget.store(budget - 1, Ordering::SeqCst);
        }

        let mut state = self.state.write().await;
        let now = Utc::now();
        let submission = FormSubmission {
            id: state.next_id(),
            form_id: input.form_id,
            form_version_id: input.form_version_id,
            organization_id: input.organization_id,
            import_job_id: input.import_job_id,
            payload: input.payload.clone(),
            completeness: input.completeness,
            submitted_by: input.submitted_by,
            created_at: now,
            updated_at: now,
        };
        let version = FormSubmissionVersion {
            id: state.next_id(),
            submission_id: submission.id,
            version_number: 1,
            payload: input.payload.clone(),
            change_source: "import".to_string(),
            created_by: input.submitted_by,
            created_at: now,
            updated_at: now,
        };
        state.submissions.push(submission.clone());
        state.submission_versions.push(version);

        let cancel_in = self.cancel_budget.load(Ordering::SeqCst);
        if cancel_in != usize::MAX {
            let cancel_in = cancel_in.saturating_sub(1);
            self.cancel_budget.store(cancel_in, Ordering::SeqCst);
            if cancel_in == 0 {
                self.cancel_budget.store(usize::MAX, Ordering::SeqCst);
                let job = match input.import_job_id {
                    Some(job_id) => state.jobs.get_mut(&job_id),
                    None => None,
                };
                if let Some(job) = job {
                    job.status = ImportJobStatus::Cancelled.as_str().to_string();
                    job.version += 1;
                    job.updated_at = now;
                }
            }
        }
        Ok(submission)
    }

    async fn count_job_submissions(&self, job_id: DbId) -> Result<i64, sqlx::Error> {
        Ok(self
            .state
            .read()
            .await
            .submissions
            .iter()
            .filter(|s| s.import_job_id == Some(job_id))
            .count() as i64)
    }
}

// ---------------------------------------------------------------------------
// Access
// ---------------------------------------------------------------------------

/// Fixed membership table.
#[derive(Debug, Clone, Default)]
pub struct StaticAccessGuard {
    memberships: HashMap<DbId, HashSet<DbId>>,
    admins: HashSet<DbId>,
}

impl StaticAccessGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_member(mut self, user_id: DbId, organization_id: DbId) -> Self {
        self.memberships
            .entry(user_id)
            .or_default()
            .insert(organization_id);
        self
    }

    pub fn with_admin(mut self, user_id: DbId) -> Self {
        self.admins.insert(user_id);
        self
    }
}

#[async_trait]
impl AccessGuard for StaticAccessGuard {
    async fn is_global_admin(&self, actor: &Actor) -> Result<bool, PipelineError> {
        Ok(self.admins.contains(&actor.user_id))
    }

    async fn organization_ids(&self, actor: &Actor) -> Result<Vec<DbId>, PipelineError> {
        let mut ids: Vec<DbId> = self
            .memberships
            .get(&actor.user_id)
            .map(|orgs| orgs.iter().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn require_org_access(
        &self,
        actor: &Actor,
        organization_id: DbId,
    ) -> Result<(), PipelineError> {
        let member = self
            .memberships
            .get(&actor.user_id)
            .is_some_and(|orgs| orgs.contains(&organization_id));
        if member || self.admins.contains(&actor.user_id) {
            Ok(())
        } else {
            Err(CoreError::Forbidden("You do not have access to this organization".into()).into())
        }
    }
}

// ---------------------------------------------------------------------------
// Object storage
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryObjectStorage {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, key: &str, bytes: impl Into<Vec<u8>>) {
        self.objects
            .write()
            .await
            .insert(key.to_string(), bytes.into());
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn remove(&self, key: &str) {
        self.objects.write().await.remove(key);
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn presign_put(
        &self,
        key: &str,
        _content_type: &str,
        expires_in: Duration,
    ) -> Result<String, PipelineError> {
        Ok(format!("memory://{key}?expires_in={}", expires_in.as_secs()))
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>, PipelineError> {
        self.get(key)
            .await
            .ok_or_else(|| PipelineError::Storage(format!("No object at '{key}'")))
    }

    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), PipelineError> {
        self.insert(key, bytes).await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryAuditSink {
    entries: RwLock<Vec<CreateAuditLog>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<CreateAuditLog> {
        self.entries.read().await.clone()
    }

    pub async fn actions(&self) -> Vec<String> {
        self.entries
            .read()
            .await
            .iter()
            .map(|e| e.action_type.clone())
            .collect()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, entry: CreateAuditLog) -> Result<(), PipelineError> {
        self.entries.write().await.push(entry);
        Ok(())
    }
}
