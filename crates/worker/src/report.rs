//! The downloadable CSV error report written for batch jobs with errors.

use sheetport_core::error::CoreError;
use sheetport_db::models::import_job_error::ImportJobError;

const REPORT_HEADERS: [&str; 5] = ["row_number", "field", "error_type", "message", "value"];

/// Render error rows as CSV, lowest row number first.
pub fn render_error_report(errors: &[ImportJobError]) -> Result<Vec<u8>, CoreError> {
    let mut sorted: Vec<&ImportJobError> = errors.iter().collect();
    sorted.sort_by_key(|e| (e.row_number, e.id));

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(REPORT_HEADERS).map_err(report_error)?;
    for error in sorted {
        writer
            .write_record([
                error.row_number.to_string().as_str(),
                error.field_key.as_deref().unwrap_or(""),
                error.error_type.as_str(),
                error.error_message.as_str(),
                error.raw_value.as_deref().unwrap_or(""),
            ])
            .map_err(report_error)?;
    }
    writer
        .into_inner()
        .map_err(|e| CoreError::Internal(format!("Failed to write error report: {e}")))
}

fn report_error(err: csv::Error) -> CoreError {
    CoreError::Internal(format!("Failed to write error report: {err}"))
}
