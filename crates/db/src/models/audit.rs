//! Audit log entity models and DTOs.
//!
//! Audit entries are immutable once written; `integrity_hash` chains each
//! entry to its predecessor.

use serde::{Deserialize, Serialize};
use sheetport_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A single audit log entry.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditLog {
    pub id: DbId,
    pub timestamp: Timestamp,
    pub user_id: Option<DbId>,
    pub organization_id: Option<DbId>,
    pub action_type: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<DbId>,
    pub details_json: Option<serde_json::Value>,
    pub integrity_hash: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for inserting a new audit log entry. The repository computes
/// `integrity_hash`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAuditLog {
    pub user_id: Option<DbId>,
    pub organization_id: Option<DbId>,
    pub action_type: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<DbId>,
    pub details_json: Option<serde_json::Value>,
}
