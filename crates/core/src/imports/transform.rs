//! Coerce raw spreadsheet cells into typed form payload values.
//!
//! Transformation is total: every input row yields a payload plus a list
//! of parse errors. A cell that cannot be coerced is left out of the
//! payload and reported instead.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::imports::field::{FieldLookup, FieldType};
use crate::imports::mapping::{is_mapped, ColumnMapping};
use crate::types::JsonRecord;

/// Checkbox cell values read as `true`. Anything else is `false`.
pub const TRUTHY_VALUES: &[&str] = &["true", "1", "yes", "y"];

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorKind {
    UnknownField,
    InvalidNumber,
    InvalidDate,
    InvalidFilePayload,
    MultiFileNotSupported,
    MissingFileReference,
}

impl ParseErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnknownField => "unknown_field",
            Self::InvalidNumber => "invalid_number",
            Self::InvalidDate => "invalid_date",
            Self::InvalidFilePayload => "invalid_file_payload",
            Self::MultiFileNotSupported => "multi_file_not_supported",
            Self::MissingFileReference => "missing_file_reference",
        }
    }
}

/// A cell that could not be coerced to its field's type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseError {
    pub field_key: String,
    pub kind: ParseErrorKind,
    pub message: String,
    pub raw_value: Option<String>,
}

/// Output of [`transform_row`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformedRow {
    pub payload: JsonRecord,
    pub parse_errors: Vec<ParseError>,
}

impl TransformedRow {
    /// Field keys that failed to parse.
    pub fn failed_fields(&self) -> impl Iterator<Item = &str> {
        self.parse_errors.iter().map(|e| e.field_key.as_str())
    }
}

// ---------------------------------------------------------------------------
// Transformation
// ---------------------------------------------------------------------------

/// Transform one raw row through `mapping` into a payload keyed by field.
///
/// Columns mapped to an empty key are ignored; absent, null and
/// whitespace-only cells are skipped.
pub fn transform_row(row: &JsonRecord, mapping: &ColumnMapping, lookup: &FieldLookup<'_>) -> TransformedRow {
    let mut out = TransformedRow::default();

    for (header, field_key) in mapping {
        if !is_mapped(field_key) {
            continue;
        }
        let raw = match row.get(header) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) if s.trim().is_empty() => continue,
            Some(v) => v,
        };
        let Some(field) = lookup.get(field_key) else {
            out.parse_errors.push(ParseError {
                field_key: field_key.clone(),
                kind: ParseErrorKind::UnknownField,
                message: format!("Column \"{header}\" is mapped to unknown field \"{field_key}\""),
                raw_value: Some(display_value(raw)),
            });
            continue;
        };

        match coerce(field.field_type, raw) {
            Ok(value) => {
                out.payload.insert(field_key.clone(), value);
            }
            Err((kind, message)) => out.parse_errors.push(ParseError {
                field_key: field_key.clone(),
                kind,
                message,
                raw_value: Some(display_value(raw)),
            }),
        }
    }

    out
}

fn coerce(field_type: FieldType, raw: &Value) -> Result<Value, (ParseErrorKind, String)> {
    match field_type {
        FieldType::Number => parse_number(raw),
        FieldType::Checkbox => Ok(Value::Bool(parse_checkbox(raw))),
        FieldType::Multiselect => Ok(parse_multiselect(raw)),
        FieldType::Date => parse_date(raw),
        FieldType::File => parse_file(raw),
        _ => Ok(raw.clone()),
    }
}

fn parse_number(raw: &Value) -> Result<Value, (ParseErrorKind, String)> {
    let invalid = |shown: &str| {
        (
            ParseErrorKind::InvalidNumber,
            format!("\"{shown}\" is not a valid number"),
        )
    };
    match raw {
        Value::Number(_) => Ok(raw.clone()),
        Value::String(s) => {
            let cleaned: String = s.chars().filter(|c| *c != ',').collect();
            let cleaned = cleaned.trim();
            if cleaned.is_empty() {
                return Ok(Value::Null);
            }
            cleaned
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| invalid(s))
        }
        other => Err(invalid(&display_value(other))),
    }
}

fn parse_checkbox(raw: &Value) -> bool {
    match raw {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => TRUTHY_VALUES.contains(&s.trim().to_lowercase().as_str()),
        _ => false,
    }
}

fn parse_multiselect(raw: &Value) -> Value {
    match raw {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(display_value)
                .filter(|s| !s.trim().is_empty())
                .map(Value::String)
                .collect(),
        ),
        Value::String(s) => Value::Array(
            s.split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| Value::String(part.to_string()))
                .collect(),
        ),
        _ => Value::Array(Vec::new()),
    }
}

fn parse_date(raw: &Value) -> Result<Value, (ParseErrorKind, String)> {
    match raw {
        Value::String(s) => Ok(Value::String(s.trim().to_string())),
        other => Err((
            ParseErrorKind::InvalidDate,
            format!("\"{}\" is not a date string", display_value(other)),
        )),
    }
}

/// File cells must carry a structured reference to an already-uploaded
/// object, either as a JSON object or as JSON text:
/// `fileName`, `mimeType`, `sizeBytes` (or `size`) and one of `storageKey`,
/// `artifactKey`, `signedUrl` or `url`. Plain strings and arrays are
/// rejected.
fn parse_file(raw: &Value) -> Result<Value, (ParseErrorKind, String)> {
    let invalid = || {
        (
            ParseErrorKind::InvalidFilePayload,
            "File cells must contain a JSON file reference".to_string(),
        )
    };
    let parsed = match raw {
        Value::Object(_) | Value::Array(_) => raw.clone(),
        Value::String(s) => serde_json::from_str::<Value>(s.trim()).map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };

    let object = match parsed {
        Value::Object(map) => map,
        Value::Array(_) => {
            return Err((
                ParseErrorKind::MultiFileNotSupported,
                "Only one file can be attached per cell".to_string(),
            ))
        }
        _ => return Err(invalid()),
    };

    let text = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let mut reference = Map::new();
    if let Some(key) = text("storageKey").or_else(|| text("artifactKey")) {
        reference.insert("storageKey".into(), Value::String(key));
    } else if let Some(url) = text("signedUrl").or_else(|| text("url")) {
        reference.insert("signedUrl".into(), Value::String(url));
    } else {
        return Err((
            ParseErrorKind::MissingFileReference,
            "File reference must include storageKey, artifactKey, signedUrl or url".to_string(),
        ));
    }

    let size = ["sizeBytes", "size"]
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_number))
        .filter(|n| n.as_f64().is_some_and(|v| v >= 0.0))
        .cloned();
    let (Some(file_name), Some(mime_type), Some(size)) = (text("fileName"), text("mimeType"), size) else {
        return Err((
            ParseErrorKind::InvalidFilePayload,
            "File reference must include fileName, mimeType and sizeBytes".to_string(),
        ));
    };

    reference.insert("fileName".into(), Value::String(file_name));
    reference.insert("mimeType".into(), Value::String(mime_type));
    reference.insert("sizeBytes".into(), Value::Number(size));
    Ok(Value::Object(reference))
}

/// Render a cell for error messages and stored raw values.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build a row from parallel header and cell slices.
pub fn row_from_cells(headers: &[String], cells: &[String]) -> JsonRecord {
    let mut row = Map::new();
    for (i, header) in headers.iter().enumerate() {
        let cell = cells.get(i).cloned().unwrap_or_default();
        row.insert(header.clone(), Value::String(cell));
    }
    row
}
