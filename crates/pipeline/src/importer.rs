//! The per-row import loop shared by the interactive runner and the batch
//! worker.

use sheetport_core::error::CoreError;
use sheetport_core::imports::field::{FieldLookup, FieldType, FormDefinition};
use sheetport_core::imports::job::ImportStats;
use sheetport_core::imports::mapping::{is_mapped, ColumnMapping};
use sheetport_core::imports::row::{evaluate_row, RowOutcome};
use sheetport_core::types::{DbId, JsonRecord};
use sheetport_db::models::import_job::ImportJob;
use sheetport_db::models::import_job_error::CreateImportJobError;
use sheetport_db::models::submission::CreateFormSubmission;

use crate::forms::LoadedForm;
use crate::ports::ImportStore;

/// Spreadsheets cannot carry file uploads; reject mappings onto file fields.
pub fn reject_file_fields(
    definition: &FormDefinition,
    mapping: &ColumnMapping,
) -> Result<(), CoreError> {
    let lookup = FieldLookup::new(definition);
    let mut keys: Vec<&str> = mapping
        .values()
        .filter(|key| is_mapped(key))
        .filter(|key| lookup.get(key).is_some_and(|f| f.field_type == FieldType::File))
        .map(String::as_str)
        .collect();
    keys.dedup();
    if keys.is_empty() {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "File fields cannot be imported from a spreadsheet: {}",
            keys.join(", ")
        )))
    }
}

/// Imports rows one at a time, accumulating stats and error rows.
pub struct RowImporter<'a> {
    form: &'a LoadedForm,
    lookup: FieldLookup<'a>,
    mapping: &'a ColumnMapping,
    job: &'a ImportJob,
    submitted_by: Option<DbId>,
    stats: ImportStats,
    errors: Vec<CreateImportJobError>,
}

impl<'a> RowImporter<'a> {
    pub fn new(
        form: &'a LoadedForm,
        mapping: &'a ColumnMapping,
        job: &'a ImportJob,
        submitted_by: Option<DbId>,
    ) -> Self {
        Self {
            form,
            lookup: FieldLookup::new(&form.definition),
            mapping,
            job,
            submitted_by,
            stats: ImportStats::default(),
            errors: Vec::new(),
        }
    }

    /// Continue counting from previously persisted stats.
    pub fn with_stats(mut self, stats: ImportStats) -> Self {
        self.stats = stats;
        self
    }

    /// Transform, validate and either insert the row or record its errors.
    ///
    /// Only infrastructure faults are returned; invalid rows are data.
    pub async fn import_row(
        &mut self,
        store: &dyn ImportStore,
        row: &JsonRecord,
        row_number: i32,
    ) -> Result<(), sqlx::Error> {
        let outcome = evaluate_row(
            &self.form.definition,
            &self.lookup,
            self.mapping,
            row,
            row_number,
        );
        match outcome {
            RowOutcome::Accepted(accepted) => {
                let submission = CreateFormSubmission {
                    form_id: self.form.form.id,
                    form_version_id: self.form.version.id,
                    organization_id: self.job.organization_id,
                    import_job_id: Some(self.job.id),
                    payload: serde_json::Value::Object(accepted.payload),
                    completeness: accepted.validation.completeness_score,
                    submitted_by: self.submitted_by,
                };
                store.insert_submission(&submission).await?;
                self.stats.record_inserted();
            }
            RowOutcome::Rejected(errors) => {
                self.stats.record_failed(errors.len());
                self.errors.extend(errors.into_iter().map(CreateImportJobError::from));
            }
        }
        Ok(())
    }

    pub fn stats(&self) -> ImportStats {
        self.stats
    }

    pub fn errors(&self) -> &[CreateImportJobError] {
        &self.errors
    }

    /// Hand over the errors collected so far, leaving the buffer empty.
    pub fn take_errors(&mut self) -> Vec<CreateImportJobError> {
        std::mem::take(&mut self.errors)
    }
}
