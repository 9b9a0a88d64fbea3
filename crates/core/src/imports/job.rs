//! Import job lifecycle: status state machine, lanes, run statistics and
//! rollback eligibility.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::hashing::is_sha256_hex;
use crate::types::{DbId, Timestamp};

/// Days after creation during which a completed job may be rolled back.
pub const DEFAULT_ROLLBACK_WINDOW_DAYS: i64 = 7;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportJobStatus {
    Pending,
    Validating,
    Validated,
    Importing,
    Completed,
    Failed,
    Cancelled,
    RolledBack,
}

impl ImportJobStatus {
    pub const ALL: &[ImportJobStatus] = &[
        Self::Pending,
        Self::Validating,
        Self::Validated,
        Self::Importing,
        Self::Completed,
        Self::Failed,
        Self::Cancelled,
        Self::RolledBack,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Validating => "validating",
            Self::Validated => "validated",
            Self::Importing => "importing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::RolledBack => "rolled_back",
        }
    }

    pub fn from_str_value(value: &str) -> Result<Self, CoreError> {
        Self::ALL
            .iter()
            .copied()
            .find(|s| s.as_str() == value)
            .ok_or_else(|| CoreError::Validation(format!("Unknown import job status '{value}'")))
    }

    /// Failed, cancelled and rolled-back jobs never move again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled | Self::RolledBack)
    }

    /// Allowed edges:
    ///
    /// ```text
    /// pending -> validating -> validated -> importing -> completed | failed
    /// any non-terminal, non-completed -> cancelled
    /// completed -> rolled_back
    /// ```
    pub fn can_transition_to(self, next: Self) -> bool {
        use ImportJobStatus::*;
        matches!(
            (self, next),
            (Pending, Validating)
                | (Validating, Validated)
                | (Validated, Importing)
                | (Importing, Completed)
                | (Importing, Failed)
                | (Pending | Validating | Validated | Importing, Cancelled)
                | (Completed, RolledBack)
        )
    }
}

impl std::fmt::Display for ImportJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reject any transition outside the state machine.
pub fn validate_transition(from: ImportJobStatus, to: ImportJobStatus) -> Result<(), CoreError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(CoreError::Conflict(format!(
            "Import job cannot move from {from} to {to}"
        )))
    }
}

// ---------------------------------------------------------------------------
// Lane and source type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportLane {
    Interactive,
    Batch,
}

impl ImportLane {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Interactive => "interactive",
            Self::Batch => "batch",
        }
    }

    pub fn from_str_value(value: &str) -> Result<Self, CoreError> {
        match value {
            "interactive" => Ok(Self::Interactive),
            "batch" => Ok(Self::Batch),
            other => Err(CoreError::Validation(format!("Unknown import lane '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Csv,
    Excel,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Excel => "excel",
        }
    }

    pub fn from_str_value(value: &str) -> Result<Self, CoreError> {
        match value {
            "csv" => Ok(Self::Csv),
            "excel" => Ok(Self::Excel),
            other => Err(CoreError::Validation(format!("Unknown source type '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Run counters. `processed` counts data rows seen; every processed row is
/// either inserted or failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStats {
    pub processed: i64,
    pub inserted: i64,
    pub failed: i64,
    pub error_count: i64,
}

impl ImportStats {
    pub fn record_inserted(&mut self) {
        self.processed += 1;
        self.inserted += 1;
    }

    pub fn record_failed(&mut self, errors: usize) {
        self.processed += 1;
        self.failed += 1;
        self.error_count += errors as i64;
    }

    pub fn is_consistent(&self) -> bool {
        self.inserted + self.failed == self.processed
    }

    pub fn to_json(self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// `{error_count, failed_rows}` when errors exist, `{}` otherwise.
    pub fn error_summary(&self) -> serde_json::Value {
        if self.error_count == 0 {
            serde_json::json!({})
        } else {
            serde_json::json!({ "error_count": self.error_count, "failed_rows": self.failed })
        }
    }
}

// ---------------------------------------------------------------------------
// Creation and rollback rules
// ---------------------------------------------------------------------------

/// Client-supplied fields checked before a job is persisted.
#[derive(Debug, Clone)]
pub struct NewJobRequest<'a> {
    pub lane: ImportLane,
    pub source_file_key: &'a str,
    pub source_file_hash: &'a str,
    pub source_row_count: Option<i32>,
    pub mapping_template_id: Option<DbId>,
}

pub fn validate_new_job(request: &NewJobRequest<'_>) -> Result<(), CoreError> {
    if request.source_file_key.trim().is_empty() {
        return Err(CoreError::Validation("Source file key is required".into()));
    }
    if !is_sha256_hex(request.source_file_hash) {
        return Err(CoreError::Validation(
            "Source file hash must be a SHA-256 hex digest".into(),
        ));
    }
    if request.source_row_count.is_some_and(|n| n < 0) {
        return Err(CoreError::Validation("Source row count cannot be negative".into()));
    }
    if request.lane == ImportLane::Batch && request.mapping_template_id.is_none() {
        return Err(CoreError::Validation(
            "Batch imports require a mapping template".into(),
        ));
    }
    Ok(())
}

/// Rollback deadline for a job created at `created_at`.
pub fn rollback_deadline(created_at: Timestamp, window_days: i64) -> Timestamp {
    created_at + Duration::days(window_days)
}

/// Facts about a job needed to decide rollback eligibility.
#[derive(Debug, Clone, Copy)]
pub struct RollbackCheck {
    pub status: ImportJobStatus,
    pub can_rollback: bool,
    pub rollback_before: Timestamp,
}

/// Check rollback preconditions in order: enabled, inside window, status.
pub fn check_rollback(job: &RollbackCheck, now: Timestamp) -> Result<(), CoreError> {
    if !job.can_rollback {
        return Err(CoreError::Forbidden("Rollback is disabled for this import".into()));
    }
    if now >= job.rollback_before {
        return Err(CoreError::Forbidden("Rollback window has expired".into()));
    }
    validate_transition(job.status, ImportJobStatus::RolledBack)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

    const HASH: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn happy_path_edges_are_allowed() {
        use ImportJobStatus::*;
        let path = [Pending, Validating, Validated, Importing, Completed, RolledBack];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
        assert!(Importing.can_transition_to(Failed));
    }

    #[test]
    fn skipping_and_reversing_are_rejected() {
        use ImportJobStatus::*;
        assert!(!Pending.can_transition_to(Importing));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Importing));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Validating.can_transition_to(Failed));
        assert_matches!(validate_transition(Pending, Failed), Err(CoreError::Conflict(_)));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in ImportJobStatus::ALL.iter().filter(|s| s.is_terminal()) {
            for to in ImportJobStatus::ALL {
                assert!(!from.can_transition_to(*to));
            }
        }
    }

    #[test]
    fn status_strings_parse() {
        assert_eq!(ImportJobStatus::from_str_value("rolled_back").unwrap(), ImportJobStatus::RolledBack);
        assert!(ImportJobStatus::from_str_value("done").is_err());
    }

    #[test]
    fn batch_requires_template() {
        let request = NewJobRequest {
            lane: ImportLane::Batch,
            source_file_key: "imports/1/a.csv",
            source_file_hash: HASH,
            source_row_count: Some(10),
            mapping_template_id: None,
        };
        assert_matches!(
            validate_new_job(&request),
            Err(CoreError::Validation(msg)) if msg == "Batch imports require a mapping template"
        );
        let interactive = NewJobRequest { lane: ImportLane::Interactive, ..request };
        assert!(validate_new_job(&interactive).is_ok());
    }

    #[test]
    fn hash_must_be_sha256() {
        let request = NewJobRequest {
            lane: ImportLane::Interactive,
            source_file_key: "imports/1/a.csv",
            source_file_hash: "abc",
            source_row_count: None,
            mapping_template_id: None,
        };
        assert!(validate_new_job(&request).is_err());
    }

    #[test]
    fn rollback_checks_in_order() {
        let now = Utc::now();
        let open = RollbackCheck {
            status: ImportJobStatus::Completed,
            can_rollback: true,
            rollback_before: rollback_deadline(now, DEFAULT_ROLLBACK_WINDOW_DAYS),
        };
        assert!(check_rollback(&open, now).is_ok());

        let disabled = RollbackCheck { can_rollback: false, ..open };
        assert_matches!(check_rollback(&disabled, now), Err(CoreError::Forbidden(m)) if m.contains("disabled"));

        let expired = RollbackCheck { rollback_before: now - Duration::seconds(1), ..open };
        assert_matches!(check_rollback(&expired, now), Err(CoreError::Forbidden(m)) if m.contains("expired"));

        let rolled_back = RollbackCheck { status: ImportJobStatus::RolledBack, ..open };
        assert_matches!(check_rollback(&rolled_back, now), Err(CoreError::Conflict(_)));
    }

    #[test]
    fn stats_stay_consistent() {
        let mut stats = ImportStats::default();
        stats.record_inserted();
        stats.record_failed(2);
        stats.record_inserted();
        assert_eq!(stats.processed, 3);
        assert!(stats.is_consistent());
        assert_eq!(stats.error_summary()["failed_rows"], 1);
        assert_eq!(ImportStats::default().error_summary(), serde_json::json!({}));
    }
}
