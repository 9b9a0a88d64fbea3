//! Autofix engine: typed fixes and pure row/mapping rewrites.
//!
//! Row fixes return a new row set plus the exact cells they changed; the
//! input rows are never mutated. Mapping fixes rewrite the column mapping
//! and leave rows untouched.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::imports::analyzer::CategorizedError;
use crate::imports::mapping::ColumnMapping;
use crate::imports::patterns;
use crate::imports::transform::display_value;
use crate::types::JsonRecord;

// ---------------------------------------------------------------------------
// Fix kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    Iso,
    UsDate,
    EuDate,
}

impl DateFormat {
    /// chrono format string.
    pub fn pattern(self) -> &'static str {
        match self {
            Self::Iso => "%Y-%m-%d",
            Self::UsDate => "%m/%d/%Y",
            Self::EuDate => "%d.%m.%Y",
        }
    }

    /// Human-readable layout used in previews.
    pub fn label(self) -> &'static str {
        match self {
            Self::Iso => "YYYY-MM-DD",
            Self::UsDate => "MM/DD/YYYY",
            Self::EuDate => "DD.MM.YYYY",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "snake_case")]
pub enum AutofixKind {
    /// Assign `column` to `field_key`. With `swap_with`, that column takes
    /// over whatever field `column` was mapped to before.
    MapColumn {
        column: String,
        field_key: String,
        swap_with: Option<String>,
    },
    /// Swap cell values between two columns in every row.
    SwapColumns { first: String, second: String },
    ConvertDateFormat {
        column: String,
        from: DateFormat,
        to: DateFormat,
    },
    NormalizeBoolean {
        column: String,
        true_values: Vec<String>,
        false_values: Vec<String>,
    },
    TrimWhitespace { column: String },
}

impl AutofixKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MapColumn { .. } => "map_column",
            Self::SwapColumns { .. } => "swap_columns",
            Self::ConvertDateFormat { .. } => "convert_date_format",
            Self::NormalizeBoolean { .. } => "normalize_boolean",
            Self::TrimWhitespace { .. } => "trim_whitespace",
        }
    }

    /// Whether the fix rewrites the mapping rather than rows.
    pub fn is_mapping_fix(&self) -> bool {
        matches!(self, Self::MapColumn { .. })
    }
}

/// A suggested fix with its caller-facing confidence and preview text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Autofix {
    pub fix: AutofixKind,
    pub confidence: f64,
    pub preview: String,
    pub confidence_reason: String,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellChange {
    /// 1-based row number.
    pub row: usize,
    pub column: String,
    pub old_value: String,
    pub new_value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutofixResult {
    pub success: bool,
    pub rows: Vec<JsonRecord>,
    /// Distinct 1-based row numbers touched, ascending.
    pub modified_rows: Vec<usize>,
    pub changes: Vec<CellChange>,
    pub error: Option<String>,
}

impl AutofixResult {
    fn changed(rows: Vec<JsonRecord>, changes: Vec<CellChange>) -> Self {
        let mut modified_rows: Vec<usize> = changes.iter().map(|c| c.row).collect();
        modified_rows.dedup();
        Self {
            success: true,
            rows,
            modified_rows,
            changes,
            error: None,
        }
    }

    fn failed(rows: &[JsonRecord], message: &str) -> Self {
        Self {
            success: false,
            rows: rows.to_vec(),
            modified_rows: Vec::new(),
            changes: Vec::new(),
            error: Some(message.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Row fixes
// ---------------------------------------------------------------------------

pub fn swap_columns(rows: &[JsonRecord], first: &str, second: &str) -> AutofixResult {
    let mut next = rows.to_vec();
    let mut changes = Vec::new();

    for (index, row) in next.iter_mut().enumerate() {
        let a = row.remove(first);
        let b = row.remove(second);
        if a.is_none() && b.is_none() {
            continue;
        }
        let shown_a = a.as_ref().map(display_value).unwrap_or_default();
        let shown_b = b.as_ref().map(display_value).unwrap_or_default();
        if let Some(b) = b {
            row.insert(first.to_string(), b);
        }
        if let Some(a) = a {
            row.insert(second.to_string(), a);
        }
        changes.push(CellChange {
            row: index + 1,
            column: first.to_string(),
            old_value: shown_a.clone(),
            new_value: shown_b.clone(),
        });
        changes.push(CellChange {
            row: index + 1,
            column: second.to_string(),
            old_value: shown_b,
            new_value: shown_a,
        });
    }

    AutofixResult::changed(next, changes)
}

pub fn convert_date_format(
    rows: &[JsonRecord],
    column: &str,
    from: DateFormat,
    to: DateFormat,
) -> AutofixResult {
    rewrite_column(rows, column, |value| {
        let trimmed = value.trim();
        let parsed = NaiveDate::parse_from_str(trimmed, from.pattern()).ok()?;
        Some(parsed.format(to.pattern()).to_string())
    })
}

pub fn normalize_boolean(
    rows: &[JsonRecord],
    column: &str,
    true_values: &[String],
    false_values: &[String],
) -> AutofixResult {
    let truthy: Vec<String> = true_values.iter().map(|v| v.to_lowercase()).collect();
    let falsy: Vec<String> = false_values.iter().map(|v| v.to_lowercase()).collect();
    rewrite_column(rows, column, |value| {
        let lower = value.trim().to_lowercase();
        if truthy.contains(&lower) {
            Some("true".to_string())
        } else if falsy.contains(&lower) {
            Some("false".to_string())
        } else {
            None
        }
    })
}

pub fn trim_whitespace(rows: &[JsonRecord], column: &str) -> AutofixResult {
    rewrite_column(rows, column, |value| Some(value.trim().to_string()))
}

/// Rewrite string cells of one column. `rewrite` returns `None` to leave a
/// cell alone; unchanged results are not recorded.
fn rewrite_column<F>(rows: &[JsonRecord], column: &str, rewrite: F) -> AutofixResult
where
    F: Fn(&str) -> Option<String>,
{
    let mut next = rows.to_vec();
    let mut changes = Vec::new();

    for (index, row) in next.iter_mut().enumerate() {
        let Some(Value::String(current)) = row.get(column) else {
            continue;
        };
        if current.trim().is_empty() {
            continue;
        }
        let Some(updated) = rewrite(current) else {
            continue;
        };
        if &updated == current {
            continue;
        }
        changes.push(CellChange {
            row: index + 1,
            column: column.to_string(),
            old_value: current.clone(),
            new_value: updated.clone(),
        });
        row.insert(column.to_string(), Value::String(updated));
    }

    AutofixResult::changed(next, changes)
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Apply a row fix. Mapping fixes are refused; see [`apply_mapping_fix`].
pub fn apply_fix(rows: &[JsonRecord], fix: &AutofixKind) -> AutofixResult {
    match fix {
        AutofixKind::MapColumn { .. } => {
            AutofixResult::failed(rows, "Column mapping fixes change the mapping, not rows")
        }
        AutofixKind::SwapColumns { first, second } => swap_columns(rows, first, second),
        AutofixKind::ConvertDateFormat { column, from, to } => {
            convert_date_format(rows, column, *from, *to)
        }
        AutofixKind::NormalizeBoolean {
            column,
            true_values,
            false_values,
        } => normalize_boolean(rows, column, true_values, false_values),
        AutofixKind::TrimWhitespace { column } => trim_whitespace(rows, column),
    }
}

/// Apply the autofix attached to a categorized error.
pub fn apply_autofix(rows: &[JsonRecord], error: &CategorizedError) -> AutofixResult {
    match &error.autofix {
        Some(autofix) => apply_fix(rows, &autofix.fix),
        None => AutofixResult::failed(rows, "No autofix available for this error"),
    }
}

/// Apply a mapping fix, returning the rewritten mapping. `None` for row
/// fixes.
pub fn apply_mapping_fix(mapping: &ColumnMapping, fix: &AutofixKind) -> Option<ColumnMapping> {
    let AutofixKind::MapColumn {
        column,
        field_key,
        swap_with,
    } = fix
    else {
        return None;
    };

    let mut next = mapping.clone();
    let previous = next.get(column).cloned().unwrap_or_default();

    match swap_with {
        Some(other) => {
            next.insert(other.clone(), previous);
        }
        None => {
            for (header, key) in next.iter_mut() {
                if key == field_key && header != column {
                    key.clear();
                }
            }
        }
    }
    next.insert(column.clone(), field_key.clone());
    Some(next)
}

/// Default spellings handed to `normalize_boolean` suggestions.
pub fn default_boolean_spellings() -> (Vec<String>, Vec<String>) {
    (
        patterns::BOOLEAN_TRUE.iter().map(|s| s.to_string()).collect(),
        patterns::BOOLEAN_FALSE.iter().map(|s| s.to_string()).collect(),
    )
}
