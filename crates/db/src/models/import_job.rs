//! Import job entity model and DTOs.
//!
//! `status`, `lane` and `source_type` are stored as constrained TEXT; the
//! typed accessors below parse them into the core enums.

use serde::{Deserialize, Serialize};
use sheetport_core::error::CoreError;
use sheetport_core::imports::job::{
    ImportJobStatus, ImportLane, ImportStats, RollbackCheck, SourceType,
};
use sheetport_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `import_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ImportJob {
    pub id: DbId,
    pub organization_id: DbId,
    pub source_type: String,
    pub lane: String,
    pub status: String,
    pub source_file_key: String,
    pub source_file_hash: String,
    pub source_row_count: Option<i32>,
    pub target_form_id: Option<DbId>,
    pub mapping_template_id: Option<DbId>,
    pub stats: serde_json::Value,
    pub error_summary: serde_json::Value,
    pub progress_checkpoint: i32,
    pub error_report_key: Option<String>,
    pub can_rollback: bool,
    pub rollback_before: Timestamp,
    /// Bumped on every transition; updates compare-and-swap on it.
    pub version: i64,
    pub created_by: Option<DbId>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ImportJob {
    pub fn status(&self) -> Result<ImportJobStatus, CoreError> {
        ImportJobStatus::from_str_value(&self.status).map_err(stored_value_error)
    }

    pub fn lane(&self) -> Result<ImportLane, CoreError> {
        ImportLane::from_str_value(&self.lane).map_err(stored_value_error)
    }

    pub fn source_type(&self) -> Result<SourceType, CoreError> {
        SourceType::from_str_value(&self.source_type).map_err(stored_value_error)
    }

    /// Parsed `stats`; an empty or foreign object reads as zero counters.
    pub fn stats(&self) -> ImportStats {
        serde_json::from_value(self.stats.clone()).unwrap_or_default()
    }

    pub fn rollback_check(&self) -> Result<RollbackCheck, CoreError> {
        Ok(RollbackCheck {
            status: self.status()?,
            can_rollback: self.can_rollback,
            rollback_before: self.rollback_before,
        })
    }
}

fn stored_value_error(err: CoreError) -> CoreError {
    CoreError::Internal(format!("Corrupt import job row: {err}"))
}

/// Request body for creating an import job.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateImportJob {
    pub organization_id: DbId,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub lane: ImportLane,
    pub source_file_key: String,
    pub source_file_hash: String,
    pub source_row_count: Option<i32>,
    pub target_form_id: Option<DbId>,
    pub mapping_template_id: Option<DbId>,
}

/// Fully resolved insert: the request plus server-assigned fields.
#[derive(Debug, Clone)]
pub struct NewImportJob {
    pub organization_id: DbId,
    pub source_type: SourceType,
    pub lane: ImportLane,
    pub source_file_key: String,
    pub source_file_hash: String,
    pub source_row_count: Option<i32>,
    pub target_form_id: Option<DbId>,
    pub mapping_template_id: Option<DbId>,
    pub created_by: DbId,
    pub rollback_before: Timestamp,
}

/// Column changes that ride along with a status transition.
#[derive(Debug, Clone, Default)]
pub struct JobChanges {
    pub stats: Option<serde_json::Value>,
    pub error_summary: Option<serde_json::Value>,
    pub error_report_key: Option<String>,
    pub set_started_at: bool,
    pub set_completed_at: bool,
}

impl JobChanges {
    pub fn started() -> Self {
        Self {
            set_started_at: true,
            ..Self::default()
        }
    }

    pub fn finished(stats: &ImportStats) -> Self {
        Self {
            stats: Some(stats.to_json()),
            error_summary: Some(stats.error_summary()),
            set_completed_at: true,
            ..Self::default()
        }
    }

    pub fn failed(reason: &str) -> Self {
        Self {
            error_summary: Some(serde_json::json!({ "reason": reason })),
            set_completed_at: true,
            ..Self::default()
        }
    }
}

/// Filter for listing jobs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportJobQuery {
    pub organization_id: Option<DbId>,
    pub status: Option<ImportJobStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

    fn job(status: &str) -> ImportJob {
        let now = Utc::now();
        ImportJob {
            id: 1,
            organization_id: 10,
            source_type: "csv".into(),
            lane: "interactive".into(),
            status: status.into(),
            source_file_key: "imports/10/a-members.csv".into(),
            source_file_hash: "0".repeat(64),
            source_row_count: Some(3),
            target_form_id: Some(5),
            mapping_template_id: None,
            stats: serde_json::json!({}),
            error_summary: serde_json::json!({}),
            progress_checkpoint: 0,
            error_report_key: None,
            can_rollback: true,
            rollback_before: now,
            version: 0,
            created_by: Some(7),
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn typed_accessors_parse_stored_text() {
        let job = job("rolled_back");
        assert_eq!(job.status().unwrap(), ImportJobStatus::RolledBack);
        assert_eq!(job.lane().unwrap(), ImportLane::Interactive);
        assert_eq!(job.source_type().unwrap(), SourceType::Csv);
    }

    #[test]
    fn unknown_stored_status_is_internal() {
        assert_matches!(job("paused").status(), Err(CoreError::Internal(_)));
    }

    #[test]
    fn empty_stats_read_as_zero() {
        assert_eq!(job("pending").stats(), ImportStats::default());
    }

    #[test]
    fn finished_changes_carry_stats_and_summary() {
        let mut stats = ImportStats::default();
        stats.record_inserted();
        stats.record_failed(2);
        let changes = JobChanges::finished(&stats);
        assert_eq!(changes.stats.unwrap()["failed"], 1);
        assert_eq!(changes.error_summary.unwrap()["error_count"], 2);
        assert!(changes.set_completed_at);
    }
}
