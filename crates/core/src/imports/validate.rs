//! Payload validation against a form definition.
//!
//! Validation never mutates the payload and never fails as a whole: it
//! reports missing required fields, per-field rule violations, and a
//! completeness score.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::imports::field::{
    ConditionOperator, FieldCondition, FieldDef, FieldType, FormDefinition, RuleKind,
};
use crate::types::JsonRecord;

static SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script>|<style\b[^>]*>.*?</style>").expect("valid regex")
});

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldValidationError {
    pub field: String,
    pub message: String,
}

/// Result of validating one payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayloadValidation {
    pub missing_fields: Vec<String>,
    pub validation_errors: Vec<FieldValidationError>,
    /// Fraction in `[0, 1]` of active fields that hold a value.
    pub completeness_score: f64,
}

impl PayloadValidation {
    pub fn is_valid(&self) -> bool {
        self.missing_fields.is_empty() && self.validation_errors.is_empty()
    }

    /// Drop findings for fields that already failed to parse, so one bad
    /// cell yields exactly one error.
    pub fn without_fields<'a>(mut self, fields: impl IntoIterator<Item = &'a str>) -> Self {
        let skip: Vec<&str> = fields.into_iter().collect();
        self.missing_fields.retain(|f| !skip.contains(&f.as_str()));
        self.validation_errors.retain(|e| !skip.contains(&e.field.as_str()));
        self
    }
}

// ---------------------------------------------------------------------------
// Sanitization
// ---------------------------------------------------------------------------

/// Strip markup from `rich_text` fields. Other fields are returned as-is.
pub fn sanitize_payload(definition: &FormDefinition, payload: &JsonRecord) -> JsonRecord {
    let mut out = payload.clone();
    for field in definition.fields.iter().filter(|f| f.field_type == FieldType::RichText) {
        if let Some(Value::String(html)) = out.get(&field.key) {
            let plain = strip_tags(html);
            out.insert(field.key.clone(), Value::String(plain));
        }
    }
    out
}

fn strip_tags(html: &str) -> String {
    let without_scripts = SCRIPT_RE.replace_all(html, "");
    TAG_RE.replace_all(&without_scripts, "").trim().to_string()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate `payload` against every active field of `definition`.
///
/// A field is active unless it carries a conditional that the payload does
/// not satisfy. Inactive fields are neither required nor scored.
pub fn validate_payload(definition: &FormDefinition, payload: &JsonRecord) -> PayloadValidation {
    let mut missing_fields = Vec::new();
    let mut validation_errors = Vec::new();
    let mut active = 0usize;
    let mut present = 0usize;

    for field in &definition.fields {
        if let Some(condition) = &field.conditional {
            if !condition_holds(condition, payload) {
                continue;
            }
        }
        active += 1;

        let value = payload.get(&field.key);
        if is_empty(value) {
            if field.required {
                missing_fields.push(field.key.clone());
            }
            continue;
        }
        present += 1;

        if let Some(value) = value {
            validation_errors.extend(check_field(field, value));
        }
    }

    let completeness_score = if active == 0 {
        1.0
    } else {
        present as f64 / active as f64
    };

    PayloadValidation {
        missing_fields,
        validation_errors,
        completeness_score,
    }
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        _ => false,
    }
}

fn condition_holds(condition: &FieldCondition, payload: &JsonRecord) -> bool {
    let actual = payload.get(&condition.field).unwrap_or(&Value::Null);
    match condition.operator {
        ConditionOperator::Equals => loosely_equal(actual, &condition.value),
        ConditionOperator::NotEquals => !loosely_equal(actual, &condition.value),
        ConditionOperator::Contains => match actual {
            Value::Array(items) => items.iter().any(|i| loosely_equal(i, &condition.value)),
            Value::String(s) => s.contains(&as_text(&condition.value)),
            _ => false,
        },
        ConditionOperator::GreaterThan => match (as_number(actual), as_number(&condition.value)) {
            (Some(a), Some(b)) => a > b,
            _ => false,
        },
    }
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    a == b || as_text(a) == as_text(b)
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn check_field(field: &FieldDef, value: &Value) -> Vec<FieldValidationError> {
    let mut errors = Vec::new();
    let error = |message: String| FieldValidationError {
        field: field.key.clone(),
        message,
    };

    if field.field_type == FieldType::Email {
        if let Value::String(s) = value {
            if !EMAIL_RE.is_match(s.trim()) {
                errors.push(error(format!("{} must be a valid email address", field.label)));
            }
        }
    }

    if matches!(field.field_type, FieldType::Select) && !field.options.is_empty() {
        let text = as_text(value);
        if !field.options.iter().any(|o| o.value == text) {
            errors.push(error(format!("\"{text}\" is not an option for {}", field.label)));
        }
    }

    for rule in &field.validation {
        let failed = match rule.kind {
            RuleKind::MinLength => rule_len(&rule.value)
                .is_some_and(|min| as_text(value).chars().count() < min),
            RuleKind::MaxLength => rule_len(&rule.value)
                .is_some_and(|max| as_text(value).chars().count() > max),
            RuleKind::Min => match (as_number(value), as_number(&rule.value)) {
                (Some(v), Some(min)) => v < min,
                _ => false,
            },
            RuleKind::Max => match (as_number(value), as_number(&rule.value)) {
                (Some(v), Some(max)) => v > max,
                _ => false,
            },
            RuleKind::Pattern => match Regex::new(&as_text(&rule.value)) {
                Ok(re) => !re.is_match(&as_text(value)),
                Err(_) => false,
            },
        };
        if failed {
            errors.push(error(rule.message.clone()));
        }
    }

    errors
}

fn rule_len(value: &Value) -> Option<usize> {
    as_number(value).filter(|n| *n >= 0.0).map(|n| n as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imports::field::{FieldOption, ValidationRule};
    use serde_json::json;

    fn record(value: Value) -> JsonRecord {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn rule(kind: RuleKind, value: Value, message: &str) -> ValidationRule {
        ValidationRule {
            kind,
            value,
            message: message.to_string(),
        }
    }

    #[test]
    fn missing_required_fields_are_listed() {
        let def = FormDefinition {
            fields: vec![
                FieldDef::new("fullName", "Full Name", FieldType::Text).required(),
                FieldDef::new("email", "Email", FieldType::Email).required(),
                FieldDef::new("notes", "Notes", FieldType::Textarea),
            ],
        };
        let result = validate_payload(&def, &record(json!({ "fullName": "Jane", "email": "  " })));
        assert_eq!(result.missing_fields, vec!["email"]);
        assert!((result.completeness_score - 1.0 / 3.0).abs() < 1e-9);
        assert!(!result.is_valid());
    }

    #[test]
    fn rules_produce_their_messages() {
        let mut name = FieldDef::new("code", "Code", FieldType::Text);
        name.validation = vec![
            rule(RuleKind::MinLength, json!(3), "Code too short"),
            rule(RuleKind::Pattern, json!("^[A-Z]+$"), "Code must be upper case"),
        ];
        let mut age = FieldDef::new("age", "Age", FieldType::Number);
        age.validation = vec![
            rule(RuleKind::Min, json!(18), "Too young"),
            rule(RuleKind::Max, json!(120), "Too old"),
        ];
        let def = FormDefinition { fields: vec![name, age] };

        let result = validate_payload(&def, &record(json!({ "code": "ab", "age": 12 })));
        let messages: Vec<&str> = result.validation_errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["Code too short", "Code must be upper case", "Too young"]);
    }

    #[test]
    fn inactive_conditional_fields_are_ignored() {
        let mut spouse = FieldDef::new("spouseName", "Spouse Name", FieldType::Text).required();
        spouse.conditional = Some(FieldCondition {
            field: "married".into(),
            operator: ConditionOperator::Equals,
            value: json!(true),
        });
        let def = FormDefinition {
            fields: vec![FieldDef::new("married", "Married", FieldType::Checkbox), spouse],
        };

        let single = validate_payload(&def, &record(json!({ "married": false })));
        assert!(single.is_valid());
        assert_eq!(single.completeness_score, 1.0);

        let married = validate_payload(&def, &record(json!({ "married": true })));
        assert_eq!(married.missing_fields, vec!["spouseName"]);
    }

    #[test]
    fn email_and_select_values_are_checked() {
        let mut plan = FieldDef::new("plan", "Plan", FieldType::Select);
        plan.options = vec![FieldOption { label: "Gold".into(), value: "gold".into() }];
        let def = FormDefinition {
            fields: vec![FieldDef::new("email", "Email", FieldType::Email), plan],
        };
        let result = validate_payload(&def, &record(json!({ "email": "not-an-email", "plan": "silver" })));
        assert_eq!(result.validation_errors.len(), 2);
    }

    #[test]
    fn parse_failures_are_not_double_reported() {
        let def = FormDefinition {
            fields: vec![FieldDef::new("amountPaid", "Dues Paid", FieldType::Number).required()],
        };
        let result = validate_payload(&def, &JsonRecord::new()).without_fields(["amountPaid"]);
        assert!(result.is_valid());
    }

    #[test]
    fn rich_text_is_stripped_to_plain_text() {
        let def = FormDefinition {
            fields: vec![
                FieldDef::new("bio", "Bio", FieldType::RichText),
                FieldDef::new("title", "Title", FieldType::Text),
            ],
        };
        let payload = record(json!({
            "bio": "<p>Hello <script>alert(1)</script><b>world</b></p>",
            "title": "<b>kept</b>",
        }));
        let clean = sanitize_payload(&def, &payload);
        assert_eq!(clean["bio"], "Hello world");
        assert_eq!(clean["title"], "<b>kept</b>");
    }

    #[test]
    fn empty_form_is_complete() {
        let result = validate_payload(&FormDefinition::default(), &JsonRecord::new());
        assert_eq!(result.completeness_score, 1.0);
    }
}
