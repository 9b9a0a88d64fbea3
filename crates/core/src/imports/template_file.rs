//! Downloadable CSV import templates generated from a form definition.
//!
//! The first data rows of a template may carry a description row and an
//! example row. With metadata markers enabled their first cell starts with
//! a skip marker so runners can drop them when the filled-in file comes
//! back.

use serde::Deserialize;
use serde_json::Value;

use crate::error::CoreError;
use crate::imports::field::{FieldDef, FieldType, FormDefinition};
use crate::imports::mapping::ColumnMapping;
use crate::imports::transform::display_value;
use crate::types::JsonRecord;

/// Prefixes marking template rows that are not data.
pub const SKIP_MARKERS: &[&str] = &["__DESCRIPTION__", "__NOTE__", "__EXAMPLE__"];

/// Identifies a file as generated by SheetPort.
pub const MARKER_TOKEN: &str = "__SHEETPORT_TEMPLATE__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateFormat {
    Xlsx,
    Csv,
}

impl TemplateFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TemplateOptions {
    pub include_descriptions: bool,
    pub include_examples: bool,
    /// Only meaningful for spreadsheet output; ignored for CSV.
    pub include_data_validation: bool,
    pub include_metadata_markers: bool,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            include_descriptions: true,
            include_examples: true,
            include_data_validation: true,
            include_metadata_markers: true,
        }
    }
}

/// Which columns the template carries.
#[derive(Debug, Clone, Default)]
pub enum TemplateColumns {
    /// Every field, headed by its label.
    #[default]
    AllFields,
    /// The listed field keys, headed by their labels.
    Fields(Vec<String>),
    /// Header to field key, e.g. from a saved mapping template.
    Mapping(ColumnMapping),
}

#[derive(Debug, Clone)]
pub struct GeneratedTemplate {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Whether a parsed row is a template description/example row.
pub fn is_template_marker_row(first_cell: &str) -> bool {
    let cell = first_cell.trim_start();
    SKIP_MARKERS.iter().any(|m| cell.starts_with(m))
}

/// `Member Dues 2024` becomes `member-dues-2024.csv`.
pub fn template_file_name(form_name: &str, format: TemplateFormat) -> String {
    let dashed: String = form_name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    let safe: String = dashed
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect::<String>()
        .to_lowercase();
    let base = if safe.is_empty() { "import-template".to_string() } else { safe };
    format!("{base}.{}", format.extension())
}

pub fn generate_template(
    definition: &FormDefinition,
    form_name: &str,
    format: TemplateFormat,
    options: TemplateOptions,
    columns: &TemplateColumns,
    defaults: Option<&JsonRecord>,
) -> Result<GeneratedTemplate, CoreError> {
    if format == TemplateFormat::Xlsx {
        return Err(CoreError::Validation(
            "Spreadsheet templates are not available; request csv".into(),
        ));
    }

    let column_defs = resolve_columns(definition, columns);
    if column_defs.is_empty() {
        return Err(CoreError::Validation("Template has no columns".into()));
    }

    let mut rows: Vec<Vec<String>> = vec![column_defs.iter().map(|(h, _)| h.clone()).collect()];

    if options.include_descriptions {
        let mut row: Vec<String> = column_defs.iter().map(|(_, f)| description_text(f)).collect();
        if options.include_metadata_markers {
            prefix_first(&mut row, &format!("{} | {MARKER_TOKEN}", SKIP_MARKERS[0]));
        }
        rows.push(row);
    }

    if options.include_examples {
        let mut row: Vec<String> = column_defs
            .iter()
            .map(|(header, field)| {
                defaults
                    .and_then(|d| d.get(&field.key).or_else(|| d.get(header)))
                    .filter(|v| !v.is_null())
                    .map(display_value)
                    .unwrap_or_else(|| example_value(field))
            })
            .collect();
        if options.include_metadata_markers {
            prefix_first(&mut row, SKIP_MARKERS[2]);
        }
        rows.push(row);
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in &rows {
        writer
            .write_record(row)
            .map_err(|e| CoreError::Internal(format!("Failed to write template row: {e}")))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| CoreError::Internal(format!("Failed to finish template: {e}")))?;

    Ok(GeneratedTemplate {
        file_name: template_file_name(form_name, format),
        content_type: "text/csv; charset=utf-8",
        bytes,
    })
}

fn resolve_columns<'a>(definition: &'a FormDefinition, columns: &TemplateColumns) -> Vec<(String, &'a FieldDef)> {
    let find = move |key: &str| definition.fields.iter().find(|f| f.key == key);
    match columns {
        TemplateColumns::AllFields => definition
            .fields
            .iter()
            .map(|f| (f.label.clone(), f))
            .collect(),
        TemplateColumns::Fields(keys) => keys
            .iter()
            .filter_map(|k| find(k))
            .map(|f| (f.label.clone(), f))
            .collect(),
        TemplateColumns::Mapping(mapping) => mapping
            .iter()
            .filter_map(|(header, key)| find(key).map(|f| (header.clone(), f)))
            .collect(),
    }
}

fn prefix_first(row: &mut [String], marker: &str) {
    if let Some(first) = row.first_mut() {
        *first = if first.is_empty() {
            marker.to_string()
        } else {
            format!("{marker} | {first}")
        };
    }
}

fn description_text(field: &FieldDef) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(description) = field.description.as_deref().filter(|d| !d.is_empty()) {
        parts.push(description.to_string());
    }
    if field.required {
        parts.push("Required".into());
    }
    if field.field_type == FieldType::Date {
        parts.push("Format: YYYY-MM-DD".into());
    }
    if matches!(field.field_type, FieldType::Select | FieldType::Multiselect) && !field.options.is_empty() {
        let options: Vec<String> = field
            .options
            .iter()
            .map(|o| format!("{} ({})", o.label, o.value))
            .collect();
        parts.push(format!("Options: {}", options.join(", ")));
    }
    parts.join(" | ")
}

fn example_value(field: &FieldDef) -> String {
    match field.field_type {
        FieldType::Number => "123".into(),
        FieldType::Email => "user@example.com".into(),
        FieldType::Phone => "555-555-5555".into(),
        FieldType::Date => "YYYY-MM-DD".into(),
        FieldType::Checkbox => "true".into(),
        FieldType::Multiselect => field
            .options
            .iter()
            .take(2)
            .map(|o| o.value.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        FieldType::Select => field.options.first().map(|o| o.value.clone()).unwrap_or_default(),
        FieldType::File => {
            let example = serde_json::json!({
                "file_name": "example.pdf",
                "mime_type": "application/pdf",
                "size_bytes": 1234,
                "storage_key": "...",
            });
            Value::to_string(&example)
        }
        _ => "Example".into(),
    }
}
