use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sheetport_core::imports::job::DEFAULT_ROLLBACK_WINDOW_DAYS;
use sheetport_core::imports::upload::DEFAULT_UPLOAD_URL_TTL_SECS;
use sheetport_core::types::{DbId, Timestamp};
use sheetport_db::models::audit::CreateAuditLog;

use crate::ports::{AccessGuard, AuditSink, BatchDispatcher, ImportStore, ObjectStorage};

/// The authenticated user an operation runs on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: DbId,
}

impl Actor {
    pub fn new(user_id: DbId) -> Self {
        Self { user_id }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub rollback_window_days: i64,
    pub upload_url_ttl: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            rollback_window_days: DEFAULT_ROLLBACK_WINDOW_DAYS,
            upload_url_ttl: Duration::from_secs(DEFAULT_UPLOAD_URL_TTL_SECS),
        }
    }
}

/// Everything an import operation needs, injected once.
#[derive(Clone)]
pub struct ImportContext {
    pub store: Arc<dyn ImportStore>,
    pub access: Arc<dyn AccessGuard>,
    pub storage: Arc<dyn ObjectStorage>,
    pub audit: Arc<dyn AuditSink>,
    pub dispatcher: Arc<dyn BatchDispatcher>,
    pub settings: PipelineSettings,
}

impl ImportContext {
    pub fn now(&self) -> Timestamp {
        Utc::now()
    }

    /// Write an audit entry. A failing audit sink never fails the operation
    /// that triggered it.
    pub async fn audit(&self, entry: CreateAuditLog) {
        let action = entry.action_type.clone();
        if let Err(e) = self.audit.record(entry).await {
            tracing::warn!(error = %e, action = %action, "Failed to record audit entry");
        }
    }
}

/// Build an audit entry for an action on one entity.
pub fn audit_entry(
    actor: &Actor,
    organization_id: Option<DbId>,
    action_type: &str,
    entity_type: &str,
    entity_id: Option<DbId>,
    details: serde_json::Value,
) -> CreateAuditLog {
    CreateAuditLog {
        user_id: Some(actor.user_id),
        organization_id,
        action_type: action_type.to_string(),
        entity_type: Some(entity_type.to_string()),
        entity_id,
        details_json: Some(details),
    }
}
