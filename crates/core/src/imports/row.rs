//! Per-row evaluation shared by the interactive and batch runners.
//!
//! A row is accepted only when it parses cleanly and validates; otherwise
//! every finding becomes a [`RowError`] and the row is skipped.

use serde::Serialize;

use crate::imports::field::{FieldLookup, FormDefinition};
use crate::imports::mapping::ColumnMapping;
use crate::imports::transform::{display_value, transform_row};
use crate::imports::validate::{sanitize_payload, validate_payload, PayloadValidation};
use crate::types::JsonRecord;

/// Error type recorded for a rule violation.
pub const ERROR_TYPE_VALIDATION: &str = "validation";
/// Error type recorded for a missing required field.
pub const ERROR_TYPE_REQUIRED: &str = "required";

/// One row-level finding, shaped for `import_job_errors`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    /// 1-based data row number (header row excluded).
    pub row_number: i32,
    pub field_key: Option<String>,
    pub error_type: String,
    pub message: String,
    pub raw_value: Option<String>,
}

/// A row ready to become a submission.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedRow {
    pub payload: JsonRecord,
    pub validation: PayloadValidation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Accepted(AcceptedRow),
    Rejected(Vec<RowError>),
}

/// Transform, sanitize and validate one row.
pub fn evaluate_row(
    definition: &FormDefinition,
    lookup: &FieldLookup<'_>,
    mapping: &ColumnMapping,
    row: &JsonRecord,
    row_number: i32,
) -> RowOutcome {
    let transformed = transform_row(row, mapping, lookup);
    let payload = sanitize_payload(definition, &transformed.payload);
    let validation = validate_payload(definition, &payload);

    let findings = validation
        .clone()
        .without_fields(transformed.failed_fields());

    if transformed.parse_errors.is_empty() && findings.is_valid() {
        return RowOutcome::Accepted(AcceptedRow { payload, validation });
    }

    let raw_for = |key: &str| payload.get(key).map(display_value).or(Some(String::new()));

    let mut errors: Vec<RowError> = transformed
        .parse_errors
        .iter()
        .map(|e| RowError {
            row_number,
            field_key: Some(e.field_key.clone()),
            error_type: e.kind.as_str().to_string(),
            message: e.message.clone(),
            raw_value: e.raw_value.clone(),
        })
        .collect();
    errors.extend(findings.validation_errors.iter().map(|e| RowError {
        row_number,
        field_key: Some(e.field.clone()),
        error_type: ERROR_TYPE_VALIDATION.to_string(),
        message: e.message.clone(),
        raw_value: raw_for(&e.field),
    }));
    errors.extend(findings.missing_fields.iter().map(|key| RowError {
        row_number,
        field_key: Some(key.clone()),
        error_type: ERROR_TYPE_REQUIRED.to_string(),
        message: "Missing required field".to_string(),
        raw_value: raw_for(key),
    }));

    RowOutcome::Rejected(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imports::field::{FieldDef, FieldType};
    use serde_json::{json, Value};

    fn definition() -> FormDefinition {
        FormDefinition {
            fields: vec![
                FieldDef::new("fullName", "Full Name", FieldType::Text).required(),
                FieldDef::new("email", "Email", FieldType::Email).required(),
                FieldDef::new("amountPaid", "Dues Paid", FieldType::Number).required(),
            ],
        }
    }

    fn mapping() -> ColumnMapping {
        [("Full Name", "fullName"), ("Email", "email"), ("Dues Paid", "amountPaid")]
            .into_iter()
            .map(|(h, k)| (h.to_string(), k.to_string()))
            .collect()
    }

    fn record(value: Value) -> JsonRecord {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn clean_row_is_accepted() {
        let def = definition();
        let outcome = evaluate_row(
            &def,
            &FieldLookup::new(&def),
            &mapping(),
            &record(json!({ "Full Name": "Jane", "Email": "jane@example.com", "Dues Paid": "40" })),
            1,
        );
        let RowOutcome::Accepted(row) = outcome else {
            panic!("expected accepted row");
        };
        assert_eq!(row.payload["amountPaid"], json!(40.0));
        assert_eq!(row.validation.completeness_score, 1.0);
    }

    #[test]
    fn unparseable_required_number_yields_single_error() {
        let def = definition();
        let outcome = evaluate_row(
            &def,
            &FieldLookup::new(&def),
            &mapping(),
            &record(json!({ "Full Name": "Sam", "Email": "sam@example.com", "Dues Paid": "abc" })),
            3,
        );
        let RowOutcome::Rejected(errors) = outcome else {
            panic!("expected rejected row");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].row_number, 3);
        assert_eq!(errors[0].field_key.as_deref(), Some("amountPaid"));
        assert_eq!(errors[0].error_type, "invalid_number");
        assert_eq!(errors[0].raw_value.as_deref(), Some("abc"));
    }

    #[test]
    fn missing_and_invalid_fields_are_all_reported() {
        let def = definition();
        let outcome = evaluate_row(
            &def,
            &FieldLookup::new(&def),
            &mapping(),
            &record(json!({ "Email": "nope" })),
            2,
        );
        let RowOutcome::Rejected(errors) = outcome else {
            panic!("expected rejected row");
        };
        let types: Vec<&str> = errors.iter().map(|e| e.error_type.as_str()).collect();
        assert_eq!(types, vec!["validation", "required", "required"]);
        assert_eq!(errors[0].raw_value.as_deref(), Some("nope"));
    }
}
