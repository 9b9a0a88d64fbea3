//! Value pattern detection for column profiling.
//!
//! Detectors classify individual cell strings. The analyzer aggregates
//! them per column to spot mismatched mappings and score autofixes.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Minimum match ratio for [`detect_best_pattern`] to report a pattern.
pub const DEFAULT_PATTERN_THRESHOLD: f64 = 0.7;

pub const BOOLEAN_TRUE: &[&str] = &["true", "yes", "y", "1", "on", "enabled"];
pub const BOOLEAN_FALSE: &[&str] = &["false", "no", "n", "0", "off", "disabled"];

macro_rules! regex {
    ($name:ident, $pattern:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($pattern).expect("valid regex"));
    };
}

regex!(EMAIL_RE, r"^[^\s@]+@[^\s@]+\.[^\s@]+$");
regex!(ISO_DATE_RE, r"^\d{4}-\d{2}-\d{2}$");
regex!(US_DATE_RE, r"^\d{1,2}/\d{1,2}/\d{4}$");
regex!(EU_DATE_RE, r"^\d{1,2}\.\d{1,2}\.\d{4}$");
regex!(GROUPED_NUMBER_RE, r"^-?\d{1,3}(,\d{3})*(\.\d+)?$");
regex!(PLAIN_NUMBER_RE, r"^-?\d+(\.\d+)?$");
regex!(PHONE_SHAPE_RE, r"^\+?\(?[0-9]{1,4}\)?[-\s./0-9]*$");
regex!(CURRENCY_PREFIX_RE, r"^[$€£¥₹]?\s*-?\d{1,3}(,\d{3})*(\.\d{1,2})?$");
regex!(CURRENCY_SUFFIX_RE, r"^-?\d{1,3}(,\d{3})*(\.\d{1,2})?\s*[$€£¥₹]?$");
regex!(PERCENT_RE, r"^-?\d+(\.\d+)?%$");
regex!(FRACTION_RE, r"^0\.\d+$");
regex!(URL_RE, r"^https?://\S+\.\S+");
regex!(CA_POSTAL_RE, r"^[A-Z]\d[A-Z]\s?\d[A-Z]\d$");
regex!(US_POSTAL_RE, r"^\d{5}(-\d{4})?$");
regex!(UUID_RE, r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$");

// ---------------------------------------------------------------------------
// Single-value detectors
// ---------------------------------------------------------------------------

pub fn is_email(value: &str) -> bool {
    EMAIL_RE.is_match(value.trim())
}

pub fn is_iso_date(value: &str) -> bool {
    ISO_DATE_RE.is_match(value.trim())
}

pub fn is_us_date(value: &str) -> bool {
    US_DATE_RE.is_match(value.trim())
}

pub fn is_eu_date(value: &str) -> bool {
    EU_DATE_RE.is_match(value.trim())
}

pub fn is_date_like(value: &str) -> bool {
    is_iso_date(value) || is_us_date(value) || is_eu_date(value)
}

pub fn is_number(value: &str) -> bool {
    let v = value.trim();
    GROUPED_NUMBER_RE.is_match(v) || PLAIN_NUMBER_RE.is_match(v)
}

pub fn is_boolean(value: &str) -> bool {
    let lower = value.trim().to_lowercase();
    BOOLEAN_TRUE.contains(&lower.as_str()) || BOOLEAN_FALSE.contains(&lower.as_str())
}

/// Canonical `true`/`false` for a boolean-like value, if recognised.
pub fn boolean_value(value: &str) -> Option<bool> {
    let lower = value.trim().to_lowercase();
    if BOOLEAN_TRUE.contains(&lower.as_str()) {
        Some(true)
    } else if BOOLEAN_FALSE.contains(&lower.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// 7 to 15 digits in a common phone layout.
pub fn is_phone(value: &str) -> bool {
    let v = value.trim();
    if !PHONE_SHAPE_RE.is_match(v) {
        return false;
    }
    let digits = v.chars().filter(char::is_ascii_digit).count();
    (7..=15).contains(&digits)
}

pub fn is_currency(value: &str) -> bool {
    let v = value.trim();
    CURRENCY_PREFIX_RE.is_match(v) || CURRENCY_SUFFIX_RE.is_match(v)
}

pub fn is_percentage(value: &str) -> bool {
    let v = value.trim();
    PERCENT_RE.is_match(v) || FRACTION_RE.is_match(v)
}

pub fn is_url(value: &str) -> bool {
    URL_RE.is_match(&value.trim().to_lowercase())
}

/// US ZIP or Canadian postal code.
pub fn is_postal_code(value: &str) -> bool {
    let v = value.trim().to_uppercase();
    CA_POSTAL_RE.is_match(&v) || US_POSTAL_RE.is_match(&v)
}

pub fn is_uuid(value: &str) -> bool {
    UUID_RE.is_match(value.trim())
}

// ---------------------------------------------------------------------------
// Pattern type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    Email,
    IsoDate,
    UsDate,
    EuDate,
    DateLike,
    Number,
    Boolean,
    Phone,
    Currency,
    Percentage,
    Url,
    PostalCode,
    Uuid,
}

impl PatternType {
    /// Detector order. Earlier patterns win ties in [`detect_best_pattern`].
    pub const ALL: &[PatternType] = &[
        Self::Email,
        Self::IsoDate,
        Self::UsDate,
        Self::EuDate,
        Self::DateLike,
        Self::Number,
        Self::Boolean,
        Self::Phone,
        Self::Currency,
        Self::Percentage,
        Self::Url,
        Self::PostalCode,
        Self::Uuid,
    ];

    pub fn matches(self, value: &str) -> bool {
        match self {
            Self::Email => is_email(value),
            Self::IsoDate => is_iso_date(value),
            Self::UsDate => is_us_date(value),
            Self::EuDate => is_eu_date(value),
            Self::DateLike => is_date_like(value),
            Self::Number => is_number(value),
            Self::Boolean => is_boolean(value),
            Self::Phone => is_phone(value),
            Self::Currency => is_currency(value),
            Self::Percentage => is_percentage(value),
            Self::Url => is_url(value),
            Self::PostalCode => is_postal_code(value),
            Self::Uuid => is_uuid(value),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::IsoDate => "iso_date",
            Self::UsDate => "us_date",
            Self::EuDate => "eu_date",
            Self::DateLike => "date_like",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Phone => "phone",
            Self::Currency => "currency",
            Self::Percentage => "percentage",
            Self::Url => "url",
            Self::PostalCode => "postal_code",
            Self::Uuid => "uuid",
        }
    }
}

// ---------------------------------------------------------------------------
// Column profiling
// ---------------------------------------------------------------------------

/// Match ratio per pattern over the non-blank values of a column.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternRatios {
    ratios: Vec<(PatternType, f64)>,
    sample_size: usize,
}

impl PatternRatios {
    pub fn ratio(&self, pattern: PatternType) -> f64 {
        self.ratios
            .iter()
            .find(|(p, _)| *p == pattern)
            .map_or(0.0, |(_, r)| *r)
    }

    /// Number of non-blank values the ratios were computed from.
    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Patterns whose ratio reaches `threshold`, in detector order.
    pub fn above(&self, threshold: f64) -> impl Iterator<Item = (PatternType, f64)> + '_ {
        self.ratios.iter().copied().filter(move |(_, r)| *r >= threshold)
    }
}

pub fn analyze_patterns<S: AsRef<str>>(values: &[S]) -> PatternRatios {
    let non_empty: Vec<&str> = values
        .iter()
        .map(AsRef::as_ref)
        .filter(|v| !v.trim().is_empty())
        .collect();
    let total = non_empty.len();

    let ratios = PatternType::ALL
        .iter()
        .map(|p| {
            let ratio = if total == 0 {
                0.0
            } else {
                non_empty.iter().filter(|v| p.matches(v)).count() as f64 / total as f64
            };
            (*p, ratio)
        })
        .collect();

    PatternRatios {
        ratios,
        sample_size: total,
    }
}

/// Highest-ratio pattern at or above `threshold`; ties go to the earlier
/// detector.
pub fn detect_best_pattern<S: AsRef<str>>(values: &[S], threshold: f64) -> Option<(PatternType, f64)> {
    let ratios = analyze_patterns(values);
    let mut best: Option<(PatternType, f64)> = None;
    for (pattern, ratio) in ratios.above(threshold) {
        if best.map_or(true, |(_, r)| ratio > r) {
            best = Some((pattern, ratio));
        }
    }
    best
}

/// Pattern suggested by a column header's wording.
pub fn header_hint(header: &str) -> Option<PatternType> {
    let lower: String = header
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase())
        .collect();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["email", "mail"]) {
        Some(PatternType::Email)
    } else if has(&["phone", "tel", "mobile"]) {
        Some(PatternType::Phone)
    } else if has(&["date", "time", "dob"]) {
        Some(PatternType::DateLike)
    } else if has(&["url", "link", "website"]) {
        Some(PatternType::Url)
    } else if has(&["zip", "postal"]) {
        Some(PatternType::PostalCode)
    } else if has(&["percent", "rate"]) {
        Some(PatternType::Percentage)
    } else if has(&["price", "cost", "amount"]) {
        Some(PatternType::Currency)
    } else if has(&["uuid", "guid"]) || lower.ends_with("id") {
        Some(PatternType::Uuid)
    } else {
        None
    }
}

/// Inputs to [`calculate_confidence`].
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceInputs {
    pub pattern_match_ratio: f64,
    pub header_hint_match: bool,
    pub conflicting_patterns: usize,
    pub sample_size: usize,
}

/// Confidence score in `[0, 1]` for an autofix suggestion.
///
/// 60% weight on the match ratio, +0.2 for a header hint, -0.15 when more
/// than one pattern matches well, -0.1 below 5 samples, +0.05 from 20.
pub fn calculate_confidence(inputs: ConfidenceInputs) -> f64 {
    let mut confidence = inputs.pattern_match_ratio * 0.6;
    if inputs.header_hint_match {
        confidence += 0.2;
    }
    if inputs.conflicting_patterns > 1 {
        confidence -= 0.15;
    }
    if inputs.sample_size < 5 {
        confidence -= 0.1;
    } else if inputs.sample_size >= 20 {
        confidence += 0.05;
    }
    confidence.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detectors_recognise_common_shapes() {
        assert!(is_email(" jane@example.com "));
        assert!(!is_email("jane@example"));
        assert!(is_us_date("1/5/2024") && !is_iso_date("1/5/2024"));
        assert!(is_eu_date("05.01.2024"));
        assert!(is_number("-1,234.5") && is_number("42") && !is_number("1,23"));
        assert!(is_phone("+1 555-123-4567") && !is_phone("12345"));
        assert!(is_currency("$1,234.56") && is_currency("99.99€"));
        assert!(is_percentage("75%") && is_percentage("0.75"));
        assert!(is_url("https://example.com/x"));
        assert!(is_postal_code("k1a 0b1") && is_postal_code("12345-6789"));
        assert!(is_uuid("550E8400-E29B-41D4-A716-446655440000"));
        assert_eq!(boolean_value("Enabled"), Some(true));
        assert_eq!(boolean_value("off"), Some(false));
        assert_eq!(boolean_value("maybe"), None);
    }

    #[test]
    fn ratios_ignore_blank_values() {
        let ratios = analyze_patterns(&["a@b.co", "", "  ", "not email"]);
        assert_eq!(ratios.sample_size(), 2);
        assert_eq!(ratios.ratio(PatternType::Email), 0.5);
    }

    #[test]
    fn all_blank_column_has_zero_ratios() {
        let ratios = analyze_patterns::<&str>(&["", " "]);
        assert!(PatternType::ALL.iter().all(|p| ratios.ratio(*p) == 0.0));
        assert_eq!(detect_best_pattern::<&str>(&[], DEFAULT_PATTERN_THRESHOLD), None);
    }

    #[test]
    fn best_pattern_prefers_highest_ratio_then_order() {
        let values = ["2024-01-05", "2024-02-10", "2024-03-15"];
        // iso_date and date_like both score 1.0; iso_date is earlier.
        assert_eq!(
            detect_best_pattern(&values, DEFAULT_PATTERN_THRESHOLD),
            Some((PatternType::IsoDate, 1.0))
        );
    }

    #[test]
    fn header_hints() {
        assert_eq!(header_hint("E-mail Address"), Some(PatternType::Email));
        assert_eq!(header_hint("Date of Birth"), Some(PatternType::DateLike));
        assert_eq!(header_hint("Member ID"), Some(PatternType::Uuid));
        assert_eq!(header_hint("Full Name"), None);
    }

    #[test]
    fn confidence_is_clamped_and_weighted() {
        let strong = calculate_confidence(ConfidenceInputs {
            pattern_match_ratio: 1.0,
            header_hint_match: true,
            conflicting_patterns: 1,
            sample_size: 25,
        });
        assert!((strong - 0.85).abs() < 1e-9);

        let weak = calculate_confidence(ConfidenceInputs {
            pattern_match_ratio: 0.1,
            header_hint_match: false,
            conflicting_patterns: 3,
            sample_size: 2,
        });
        assert_eq!(weak, 0.0);
    }
}
