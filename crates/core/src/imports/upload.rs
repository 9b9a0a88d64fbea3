//! Upload handshake helpers: file name sanitising and storage keys.

use crate::error::CoreError;
use crate::types::DbId;

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: i64 = 50 * 1024 * 1024;

/// Default lifetime of a presigned upload URL.
pub const DEFAULT_UPLOAD_URL_TTL_SECS: u64 = 900;

/// Replace every character outside `[A-Za-z0-9_.-]` with `_`.
pub fn sanitize_file_name(file_name: &str) -> String {
    file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `imports/{organization_id}/{random_id}-{safe_name}`.
pub fn upload_storage_key(organization_id: DbId, random_id: &str, file_name: &str) -> String {
    format!(
        "imports/{organization_id}/{random_id}-{}",
        sanitize_file_name(file_name)
    )
}

/// Where the batch worker writes a job's error report.
pub fn error_report_key(job_id: DbId) -> String {
    format!("imports/{job_id}/errors.csv")
}

/// Whether a storage key belongs to an organization's upload prefix.
pub fn key_belongs_to(organization_id: DbId, key: &str) -> bool {
    key.starts_with(&format!("imports/{organization_id}/"))
}

pub fn validate_upload_request(file_name: &str, size_bytes: i64) -> Result<(), CoreError> {
    if file_name.trim().is_empty() {
        return Err(CoreError::Validation("File name is required".into()));
    }
    if size_bytes <= 0 {
        return Err(CoreError::Validation("File is empty".into()));
    }
    if size_bytes > MAX_UPLOAD_BYTES {
        return Err(CoreError::Validation(format!(
            "File exceeds the {} MB upload limit",
            MAX_UPLOAD_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}
