//! Error analysis for an upload preview.
//!
//! Combines structural checks on the header row and mapping, per-column
//! pattern profiling, and per-row transform/validate findings into
//! categorized errors. Several findings carry an [`Autofix`] with a
//! confidence score; the score is advisory and nothing here enforces it.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::imports::autofix::{default_boolean_spellings, Autofix, AutofixKind, DateFormat};
use crate::imports::field::{FieldDef, FieldLookup, FieldType, FormDefinition};
use crate::imports::mapping::{
    header_for_field, is_mapped, is_metadata_marker, normalize_key, ColumnMapping,
};
use crate::imports::patterns::{
    self, analyze_patterns, calculate_confidence, header_hint, ConfidenceInputs, PatternRatios,
    PatternType, DEFAULT_PATTERN_THRESHOLD,
};
use crate::imports::row::{evaluate_row, RowOutcome, ERROR_TYPE_REQUIRED};
use crate::imports::transform::display_value;
use crate::types::{DbId, JsonRecord};

/// Autofixes at or above this confidence are listed in
/// [`AnalysisResult::suggested_autofixes`].
pub const SUGGESTION_THRESHOLD: f64 = 0.8;

/// Sample values kept per categorized error.
pub const MAX_SAMPLE_VALUES: usize = 3;

/// Payload key checked against the importing organization.
pub const ORGANIZATION_FIELD_KEY: &str = "organizationId";

const ERROR_TYPE_REFERENTIAL: &str = "referential";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Structural,
    DataQuality,
    Completeness,
    Referential,
}

impl ErrorCategory {
    /// Position in reported output; lower sorts first.
    pub fn rank(self) -> u8 {
        match self {
            Self::Structural => 0,
            Self::Referential => 1,
            Self::DataQuality => 2,
            Self::Completeness => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizedError {
    pub id: String,
    pub category: ErrorCategory,
    pub severity: Severity,
    pub code: String,
    pub summary: String,
    pub details: String,
    /// 1-based data row numbers.
    pub affected_rows: Vec<i32>,
    pub affected_columns: Vec<String>,
    pub sample_values: Vec<String>,
    pub autofix: Option<Autofix>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisStats {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub error_rows: usize,
    pub warning_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub errors: Vec<CategorizedError>,
    pub warnings: Vec<CategorizedError>,
    pub stats: AnalysisStats,
    /// False only when a structural error has no autofix.
    pub can_proceed: bool,
    /// Ids of findings whose autofix confidence reaches
    /// [`SUGGESTION_THRESHOLD`].
    pub suggested_autofixes: Vec<String>,
}

/// Organization context for referential checks.
#[derive(Debug, Clone, Default)]
pub struct AnalysisContext {
    pub organization_id: Option<DbId>,
    /// Allowed values per field key; anything else is a dangling reference.
    pub known_references: HashMap<String, HashSet<String>>,
}

pub struct AnalysisInput<'a> {
    pub headers: &'a [String],
    pub rows: &'a [JsonRecord],
    pub definition: &'a FormDefinition,
    pub mapping: &'a ColumnMapping,
    pub context: &'a AnalysisContext,
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

pub fn analyze(input: &AnalysisInput<'_>) -> AnalysisResult {
    let mut ids = IdSequence::default();
    let lookup = FieldLookup::new(input.definition);
    let profiles = ColumnProfiles::build(input.headers, input.rows);

    let mut findings = Vec::new();
    findings.extend(duplicate_headers(input, &mut ids));
    findings.extend(unmapped_required_fields(input, &profiles, &mut ids));
    findings.extend(mapping_mismatches(input, &lookup, &profiles, &mut ids));
    findings.extend(unknown_columns(input, &mut ids));
    findings.extend(date_format_mismatches(input, &lookup, &mut ids));
    findings.extend(boolean_spellings(input, &lookup, &mut ids));
    findings.extend(stray_whitespace(input, &mut ids));
    findings.extend(row_issues(input, &lookup, &mut ids));
    // Stable: check order is kept within a category.
    findings.sort_by_key(|f| f.category.rank());

    let (errors, warnings): (Vec<_>, Vec<_>) = findings
        .into_iter()
        .partition(|f| f.severity == Severity::Error);

    let can_proceed = !errors
        .iter()
        .any(|e| e.category == ErrorCategory::Structural && e.autofix.is_none());

    let suggested_autofixes = errors
        .iter()
        .chain(warnings.iter())
        .filter(|f| f.autofix.as_ref().is_some_and(|a| a.confidence >= SUGGESTION_THRESHOLD))
        .map(|f| f.id.clone())
        .collect();

    let error_rows: BTreeSet<i32> = errors.iter().flat_map(|e| e.affected_rows.iter().copied()).collect();
    let warning_rows = warnings
        .iter()
        .flat_map(|w| w.affected_rows.iter().copied())
        .filter(|r| !error_rows.contains(r))
        .collect::<BTreeSet<_>>()
        .len();
    let total_rows = input.rows.len();

    AnalysisResult {
        stats: AnalysisStats {
            total_rows,
            valid_rows: total_rows.saturating_sub(error_rows.len()),
            error_rows: error_rows.len(),
            warning_rows,
        },
        errors,
        warnings,
        can_proceed,
        suggested_autofixes,
    }
}

#[derive(Default)]
struct IdSequence(usize);

impl IdSequence {
    fn next(&mut self, code: &str) -> String {
        self.0 += 1;
        format!("{}-{}", code.to_lowercase(), self.0)
    }
}

fn finding(ids: &mut IdSequence, category: ErrorCategory, severity: Severity, code: &str) -> CategorizedError {
    CategorizedError {
        id: ids.next(code),
        category,
        severity,
        code: code.to_string(),
        summary: String::new(),
        details: String::new(),
        affected_rows: Vec::new(),
        affected_columns: Vec::new(),
        sample_values: Vec::new(),
        autofix: None,
    }
}

// -- column profiling ---------------------------------------------------------

struct ColumnProfiles {
    by_header: HashMap<String, (Vec<String>, PatternRatios)>,
}

impl ColumnProfiles {
    fn build(headers: &[String], rows: &[JsonRecord]) -> Self {
        let by_header = headers
            .iter()
            .map(|h| {
                let values = column_values(rows, h);
                let ratios = analyze_patterns(&values);
                (h.clone(), (values, ratios))
            })
            .collect();
        Self { by_header }
    }

    fn ratios(&self, header: &str) -> Option<&PatternRatios> {
        self.by_header.get(header).map(|(_, r)| r)
    }

    fn values(&self, header: &str) -> &[String] {
        self.by_header.get(header).map(|(v, _)| v.as_slice()).unwrap_or(&[])
    }
}

/// Non-blank trimmed text of one column.
fn column_values(rows: &[JsonRecord], header: &str) -> Vec<String> {
    rows.iter()
        .filter_map(|r| r.get(header))
        .map(display_value)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn expected_pattern(field_type: FieldType) -> Option<PatternType> {
    match field_type {
        FieldType::Email => Some(PatternType::Email),
        FieldType::Date => Some(PatternType::DateLike),
        FieldType::Number => Some(PatternType::Number),
        FieldType::Phone => Some(PatternType::Phone),
        FieldType::Checkbox => Some(PatternType::Boolean),
        _ => None,
    }
}

fn confidence_for(ratios: &PatternRatios, header: &str, pattern: PatternType) -> (f64, String) {
    let ratio = ratios.ratio(pattern);
    let hint = header_hint(header) == Some(pattern);
    let conflicting = ratios.above(DEFAULT_PATTERN_THRESHOLD).count();
    let confidence = calculate_confidence(ConfidenceInputs {
        pattern_match_ratio: ratio,
        header_hint_match: hint,
        conflicting_patterns: conflicting,
        sample_size: ratios.sample_size(),
    });
    let reason = format!(
        "{:.0}% of {} values look like {}{}",
        ratio * 100.0,
        ratios.sample_size(),
        pattern.as_str(),
        if hint { "; header name agrees" } else { "" },
    );
    (confidence, reason)
}

// -- structural -----------------------------------------------------------------

fn duplicate_headers(input: &AnalysisInput<'_>, ids: &mut IdSequence) -> Vec<CategorizedError> {
    let mut seen = HashSet::new();
    let mut reported = BTreeSet::new();
    for header in input.headers {
        let trimmed = header.trim();
        if !seen.insert(trimmed) {
            reported.insert(trimmed.to_string());
        }
    }
    reported
        .into_iter()
        .map(|header| {
            let mut e = finding(ids, ErrorCategory::Structural, Severity::Error, "DUPLICATE_HEADER");
            e.summary = format!("Column \"{header}\" appears more than once");
            e.details = "Rename or remove the duplicate column so every header is unique.".into();
            e.affected_columns = vec![header];
            e
        })
        .collect()
}

fn unmapped_required_fields(
    input: &AnalysisInput<'_>,
    profiles: &ColumnProfiles,
    ids: &mut IdSequence,
) -> Vec<CategorizedError> {
    let mapped: HashSet<&str> = input
        .mapping
        .values()
        .filter(|k| is_mapped(k))
        .map(String::as_str)
        .collect();
    let free_headers: Vec<&String> = input
        .headers
        .iter()
        .filter(|h| !is_metadata_marker(h) && !input.mapping.contains_key(h.as_str()))
        .collect();

    input
        .definition
        .fields
        .iter()
        .filter(|f| f.required && !mapped.contains(f.key.as_str()))
        .map(|field| {
            let mut e = finding(ids, ErrorCategory::Structural, Severity::Error, "REQUIRED_FIELD_NOT_MAPPED");
            e.summary = format!("Missing required column for \"{}\"", field.label);
            e.details = "Map an existing column or add the column to your upload.".into();
            if let Some((header, confidence, reason)) = best_candidate(field, &free_headers, profiles) {
                e.affected_columns = vec![header.clone()];
                e.sample_values = profiles.values(&header).iter().take(MAX_SAMPLE_VALUES).cloned().collect();
                e.autofix = Some(Autofix {
                    preview: format!("Map column \"{header}\" to \"{}\"", field.label),
                    fix: AutofixKind::MapColumn {
                        column: header,
                        field_key: field.key.clone(),
                        swap_with: None,
                    },
                    confidence,
                    confidence_reason: reason,
                });
            }
            e
        })
        .collect()
}

/// Pick the unmapped header most likely to hold `field`.
fn best_candidate(
    field: &FieldDef,
    headers: &[&String],
    profiles: &ColumnProfiles,
) -> Option<(String, f64, String)> {
    let key = normalize_key(&field.key);
    let label = normalize_key(&field.label);
    let mut best: Option<(String, f64, String)> = None;

    for header in headers {
        let normalized = normalize_key(header);
        let scored = match expected_pattern(field.field_type) {
            Some(pattern) => profiles.ratios(header).and_then(|ratios| {
                (ratios.ratio(pattern) >= DEFAULT_PATTERN_THRESHOLD)
                    .then(|| confidence_for(ratios, header, pattern))
            }),
            // Text-like fields: fall back to partial name overlap.
            None => (!normalized.is_empty()
                && (key.contains(&normalized) || label.contains(&normalized)))
            .then(|| (0.6, format!("Header \"{header}\" partially matches \"{}\"", field.label))),
        };
        if let Some((confidence, reason)) = scored {
            if best.as_ref().map_or(true, |(_, c, _)| confidence > *c) {
                best = Some(((*header).clone(), confidence, reason));
            }
        }
    }
    best
}

fn mapping_mismatches(
    input: &AnalysisInput<'_>,
    lookup: &FieldLookup<'_>,
    profiles: &ColumnProfiles,
    ids: &mut IdSequence,
) -> Vec<CategorizedError> {
    let mapped: Vec<(&String, &String)> = input.mapping.iter().filter(|(_, k)| is_mapped(k)).collect();
    let mut out = Vec::new();

    for (header, field_key) in &mapped {
        let Some(field) = lookup.get(field_key) else { continue };
        let pattern = match field.field_type {
            FieldType::Email => PatternType::Email,
            FieldType::Date => PatternType::DateLike,
            _ => continue,
        };
        let Some(own) = profiles.ratios(header) else { continue };
        if own.sample_size() == 0 || own.ratio(pattern) >= 0.2 {
            continue;
        }
        let candidate = mapped.iter().find(|(other, other_key)| {
            other_key != field_key && profiles.ratios(other).is_some_and(|r| r.ratio(pattern) > 0.8)
        });
        let Some((candidate, _)) = candidate else { continue };
        let Some(candidate_ratios) = profiles.ratios(candidate) else { continue };
        let (confidence, reason) = confidence_for(candidate_ratios, candidate, pattern);

        let noun = if pattern == PatternType::Email { "emails" } else { "dates" };
        let mut e = finding(ids, ErrorCategory::Structural, Severity::Error, "MAPPING_MISMATCH");
        e.summary = format!("Column \"{header}\" does not look like {noun}");
        e.details = format!("Values in \"{candidate}\" look like {noun}. Swap mappings?");
        e.affected_columns = vec![(*header).clone(), (*candidate).clone()];
        e.sample_values = profiles.values(header).iter().take(MAX_SAMPLE_VALUES).cloned().collect();
        e.autofix = Some(Autofix {
            fix: AutofixKind::MapColumn {
                column: (*candidate).clone(),
                field_key: (*field_key).clone(),
                swap_with: Some((*header).clone()),
            },
            confidence,
            preview: format!("Swap mapping between \"{header}\" and \"{candidate}\""),
            confidence_reason: reason,
        });
        out.push(e);
    }
    out
}

fn unknown_columns(input: &AnalysisInput<'_>, ids: &mut IdSequence) -> Vec<CategorizedError> {
    input
        .headers
        .iter()
        .filter(|h| !is_metadata_marker(h) && !input.mapping.contains_key(h.as_str()))
        .map(|header| {
            let mut e = finding(ids, ErrorCategory::Structural, Severity::Warning, "UNMAPPED_COLUMN");
            e.summary = format!("Column \"{header}\" does not match any form field");
            e.details = "The column will be ignored unless it is mapped.".into();
            e.affected_columns = vec![header.clone()];
            e
        })
        .collect()
}

// -- column-level data quality ----------------------------------------------------

fn date_format_mismatches(
    input: &AnalysisInput<'_>,
    lookup: &FieldLookup<'_>,
    ids: &mut IdSequence,
) -> Vec<CategorizedError> {
    let mut out = Vec::new();
    for (header, field_key) in input.mapping {
        let Some(field) = lookup.get(field_key) else { continue };
        if field.field_type != FieldType::Date {
            continue;
        }
        let rows = cells(input.rows, header);
        let iso = rows.iter().filter(|(_, v)| patterns::is_iso_date(v)).count();
        if iso > 0 {
            continue;
        }
        for from in [DateFormat::UsDate, DateFormat::EuDate] {
            let matcher = match from {
                DateFormat::UsDate => patterns::is_us_date,
                _ => patterns::is_eu_date,
            };
            let hits: Vec<&(i32, String)> = rows.iter().filter(|(_, v)| matcher(v)).collect();
            if hits.is_empty() {
                continue;
            }
            let mut e = finding(ids, ErrorCategory::DataQuality, Severity::Error, "DATE_FORMAT_MISMATCH");
            e.summary = format!("Date format mismatch in \"{}\"", field.label);
            e.details = format!(
                "Expected {}. Detected {} in {} rows.",
                DateFormat::Iso.label(),
                from.label(),
                hits.len()
            );
            e.affected_rows = hits.iter().map(|(r, _)| *r).collect();
            e.affected_columns = vec![header.clone()];
            e.sample_values = hits.iter().take(MAX_SAMPLE_VALUES).map(|(_, v)| v.clone()).collect();
            e.autofix = Some(Autofix {
                fix: AutofixKind::ConvertDateFormat {
                    column: header.clone(),
                    from,
                    to: DateFormat::Iso,
                },
                confidence: 0.9,
                preview: format!(
                    "Convert {} values from {} to {}",
                    hits.len(),
                    from.label(),
                    DateFormat::Iso.label()
                ),
                confidence_reason: format!("{} of {} dates share one layout", hits.len(), rows.len()),
            });
            out.push(e);
            break;
        }
    }
    out
}

fn boolean_spellings(
    input: &AnalysisInput<'_>,
    lookup: &FieldLookup<'_>,
    ids: &mut IdSequence,
) -> Vec<CategorizedError> {
    let mut out = Vec::new();
    for (header, field_key) in input.mapping {
        let Some(field) = lookup.get(field_key) else { continue };
        if field.field_type != FieldType::Checkbox {
            continue;
        }
        let hits: Vec<(i32, String)> = cells(input.rows, header)
            .into_iter()
            .filter(|(_, v)| patterns::is_boolean(v) && v != "true" && v != "false")
            .collect();
        if hits.is_empty() {
            continue;
        }
        let (true_values, false_values) = default_boolean_spellings();
        let mut e = finding(ids, ErrorCategory::DataQuality, Severity::Warning, "BOOLEAN_FORMAT");
        e.summary = format!("Non-standard yes/no values in \"{}\"", field.label);
        e.details = format!("{} values use spellings other than true/false.", hits.len());
        e.affected_rows = hits.iter().map(|(r, _)| *r).collect();
        e.affected_columns = vec![header.clone()];
        e.sample_values = hits.iter().take(MAX_SAMPLE_VALUES).map(|(_, v)| v.clone()).collect();
        e.autofix = Some(Autofix {
            fix: AutofixKind::NormalizeBoolean {
                column: header.clone(),
                true_values,
                false_values,
            },
            confidence: 0.95,
            preview: format!("Rewrite {} values in \"{header}\" as true/false", hits.len()),
            confidence_reason: "Every value is a recognised yes/no spelling".into(),
        });
        out.push(e);
    }
    out
}

fn stray_whitespace(input: &AnalysisInput<'_>, ids: &mut IdSequence) -> Vec<CategorizedError> {
    let mut out = Vec::new();
    for (header, field_key) in input.mapping {
        if !is_mapped(field_key) {
            continue;
        }
        let hits: Vec<(i32, &str)> = input
            .rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| match row.get(header) {
                Some(Value::String(s)) if !s.trim().is_empty() && s.trim() != s => {
                    Some((i as i32 + 1, s.as_str()))
                }
                _ => None,
            })
            .collect();
        if hits.is_empty() {
            continue;
        }
        let mut e = finding(ids, ErrorCategory::DataQuality, Severity::Warning, "WHITESPACE");
        e.summary = format!("Leading or trailing spaces in \"{header}\"");
        e.details = format!("{} values carry extra whitespace.", hits.len());
        e.affected_rows = hits.iter().map(|(r, _)| *r).collect();
        e.affected_columns = vec![header.clone()];
        e.sample_values = hits.iter().take(MAX_SAMPLE_VALUES).map(|(_, v)| v.to_string()).collect();
        e.autofix = Some(Autofix {
            fix: AutofixKind::TrimWhitespace { column: header.clone() },
            confidence: 0.99,
            preview: format!("Trim whitespace from {} values in \"{header}\"", hits.len()),
            confidence_reason: "Whitespace removal never changes visible content".into(),
        });
        out.push(e);
    }
    out
}

/// `(row_number, trimmed text)` for non-blank cells of one column.
fn cells(rows: &[JsonRecord], header: &str) -> Vec<(i32, String)> {
    rows.iter()
        .enumerate()
        .filter_map(|(i, row)| {
            let text = display_value(row.get(header)?).trim().to_string();
            (!text.is_empty()).then_some((i as i32 + 1, text))
        })
        .collect()
}

// -- row-level findings -------------------------------------------------------------

struct RowIssue {
    row_number: i32,
    field_key: Option<String>,
    error_type: String,
    message: String,
    raw_value: Option<String>,
}

fn row_issues(
    input: &AnalysisInput<'_>,
    lookup: &FieldLookup<'_>,
    ids: &mut IdSequence,
) -> Vec<CategorizedError> {
    let mut issues = Vec::new();
    for (index, row) in input.rows.iter().enumerate() {
        let row_number = index as i32 + 1;
        if let RowOutcome::Rejected(errors) =
            evaluate_row(input.definition, lookup, input.mapping, row, row_number)
        {
            issues.extend(errors.into_iter().map(|e| RowIssue {
                row_number,
                field_key: e.field_key,
                error_type: e.error_type,
                message: e.message,
                raw_value: e.raw_value,
            }));
        }
        issues.extend(referential_issues(input, row, row_number));
    }

    let mut grouped: Vec<CategorizedError> = Vec::new();
    let mut index_by_key: HashMap<String, usize> = HashMap::new();

    for issue in issues {
        let (category, severity) = match issue.error_type.as_str() {
            ERROR_TYPE_REQUIRED => (ErrorCategory::Completeness, Severity::Error),
            ERROR_TYPE_REFERENTIAL => (ErrorCategory::Referential, Severity::Warning),
            _ => (ErrorCategory::DataQuality, Severity::Error),
        };
        let key = format!(
            "{category:?}:{}:{}",
            issue.field_key.as_deref().unwrap_or("row"),
            issue.error_type
        );
        let sample = issue.raw_value.filter(|v| !v.is_empty());

        if let Some(&i) = index_by_key.get(&key) {
            let existing = &mut grouped[i];
            existing.affected_rows.push(issue.row_number);
            if let Some(sample) = sample {
                if existing.sample_values.len() < MAX_SAMPLE_VALUES {
                    existing.sample_values.push(sample);
                }
            }
            continue;
        }

        let code = issue.error_type.to_uppercase();
        let mut e = finding(ids, category, severity, &code);
        e.summary = match &issue.field_key {
            Some(field) => format!("{} ({field})", issue.message),
            None => issue.message.clone(),
        };
        e.details = issue.message;
        e.affected_rows = vec![issue.row_number];
        e.affected_columns = issue
            .field_key
            .as_deref()
            .and_then(|k| header_for_field(input.mapping, k))
            .map(|h| vec![h.to_string()])
            .unwrap_or_default();
        e.sample_values = sample.into_iter().collect();
        index_by_key.insert(key, grouped.len());
        grouped.push(e);
    }
    grouped
}

fn referential_issues(input: &AnalysisInput<'_>, row: &JsonRecord, row_number: i32) -> Vec<RowIssue> {
    let mut out = Vec::new();
    for (header, field_key) in input.mapping {
        if !is_mapped(field_key) {
            continue;
        }
        let Some(raw) = row.get(header).map(display_value).map(|v| v.trim().to_string()) else {
            continue;
        };
        if raw.is_empty() {
            continue;
        }

        if field_key == ORGANIZATION_FIELD_KEY {
            if let Some(org) = input.context.organization_id {
                if raw != org.to_string() {
                    out.push(RowIssue {
                        row_number,
                        field_key: Some(field_key.clone()),
                        error_type: ERROR_TYPE_REFERENTIAL.into(),
                        message: "Organization ID does not match selected organization".into(),
                        raw_value: Some(raw.clone()),
                    });
                }
            }
        }
        if let Some(known) = input.context.known_references.get(field_key) {
            if !known.contains(&raw) {
                out.push(RowIssue {
                    row_number,
                    field_key: Some(field_key.clone()),
                    error_type: ERROR_TYPE_REFERENTIAL.into(),
                    message: format!("\"{raw}\" does not match an existing record"),
                    raw_value: Some(raw),
                });
            }
        }
    }
    out
}
