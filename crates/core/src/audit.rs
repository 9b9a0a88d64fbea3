//! Audit trail constants and helpers for import operations.
//!
//! Every state-changing import operation records one audit entry. Entries
//! form a SHA-256 hash chain so tampering with a past entry is detectable.

use crate::hashing;

// ---------------------------------------------------------------------------
// Action type constants
// ---------------------------------------------------------------------------

/// Known action types for audit log entries.
pub mod action_types {
    pub const IMPORT_JOB_CREATE: &str = "import_job_create";
    pub const IMPORT_JOB_STATUS_UPDATE: &str = "import_job_status_update";
    pub const IMPORT_JOB_COMPLETE: &str = "import_job_complete";
    pub const IMPORT_JOB_FAIL: &str = "import_job_fail";
    pub const IMPORT_JOB_ROLLBACK: &str = "import_job_rollback";
    pub const IMPORT_TEMPLATE_CREATE: &str = "import_template_create";
    pub const IMPORT_TEMPLATE_UPDATE: &str = "import_template_update";
    pub const IMPORT_TEMPLATE_DELETE: &str = "import_template_delete";
    pub const IMPORT_UPLOAD_INIT: &str = "import_upload_init";
}

/// Entity types referenced by `audit_logs.entity_type`.
pub mod entity_types {
    pub const IMPORT_JOB: &str = "import_job";
    pub const IMPORT_MAPPING_TEMPLATE: &str = "import_mapping_template";
    pub const IMPORT_UPLOAD: &str = "import_upload";
}

// ---------------------------------------------------------------------------
// Integrity hash computation
// ---------------------------------------------------------------------------

/// Known seed value for the first entry in the hash chain.
const CHAIN_SEED: &str = "SHEETPORT_AUDIT_CHAIN_V1";

/// Compute the SHA-256 integrity hash for an audit log entry.
///
/// `prev_hash` is the integrity_hash of the previous entry, or `None` for the
/// first entry in the chain.
pub fn compute_integrity_hash(prev_hash: Option<&str>, entry_data: &str) -> String {
    let prev = prev_hash.unwrap_or(CHAIN_SEED);
    let combined = format!("{prev}|{entry_data}");
    hashing::sha256_hex(combined.as_bytes())
}

// ---------------------------------------------------------------------------
// Redaction
// ---------------------------------------------------------------------------

/// Keys whose values never reach the audit log.
///
/// Upload URLs carry presigned credentials; raw values may hold personal data
/// from the spreadsheet.
pub const SENSITIVE_FIELDS: &[&str] = &[
    "token",
    "secret",
    "authorization",
    "upload_url",
    "signature",
    "raw_value",
];

/// Redact sensitive keys from a JSON value, recursively.
pub fn redact_sensitive_fields(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut redacted = serde_json::Map::new();
            for (key, val) in map {
                let lower_key = key.to_lowercase();
                if SENSITIVE_FIELDS.iter().any(|f| lower_key.contains(f)) {
                    redacted.insert(
                        key.clone(),
                        serde_json::Value::String("[REDACTED]".to_string()),
                    );
                } else {
                    redacted.insert(key.clone(), redact_sensitive_fields(val));
                }
            }
            serde_json::Value::Object(redacted)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(redact_sensitive_fields).collect())
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chained_entry_differs_from_first() {
        let first = compute_integrity_hash(None, "entry_1");
        let second = compute_integrity_hash(Some(&first), "entry_1");
        assert_ne!(first, second);
        assert_eq!(second.len(), 64);
    }

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(
            compute_integrity_hash(Some("abc"), "data"),
            compute_integrity_hash(Some("abc"), "data"),
        );
    }

    #[test]
    fn upload_url_and_nested_raw_values_are_redacted() {
        let details = json!({
            "upload_url": "https://bucket/key?X-Amz-Signature=abc",
            "storage_key": "imports/1/file.csv",
            "errors": [{ "raw_value": "jane@example.com", "row_number": 2 }],
        });
        let redacted = redact_sensitive_fields(&details);
        assert_eq!(redacted["upload_url"], "[REDACTED]");
        assert_eq!(redacted["storage_key"], "imports/1/file.csv");
        assert_eq!(redacted["errors"][0]["raw_value"], "[REDACTED]");
        assert_eq!(redacted["errors"][0]["row_number"], 2);
    }
}
