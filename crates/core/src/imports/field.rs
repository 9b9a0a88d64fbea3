//! Form schema types consumed by the import pipeline.
//!
//! A form version stores its definition as JSON; these types mirror that
//! document. Unknown field types deserialize to [`FieldType::Other`] and
//! are passed through untouched.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Field type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Text,
    Textarea,
    RichText,
    Email,
    Phone,
    Number,
    Date,
    Select,
    Multiselect,
    Checkbox,
    File,
    Other,
}

impl FieldType {
    pub const ALL: &[FieldType] = &[
        Self::Text,
        Self::Textarea,
        Self::RichText,
        Self::Email,
        Self::Phone,
        Self::Number,
        Self::Date,
        Self::Select,
        Self::Multiselect,
        Self::Checkbox,
        Self::File,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Textarea => "textarea",
            Self::RichText => "rich_text",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Number => "number",
            Self::Date => "date",
            Self::Select => "select",
            Self::Multiselect => "multiselect",
            Self::Checkbox => "checkbox",
            Self::File => "file",
            Self::Other => "other",
        }
    }

    /// Parse a stored type name. Unrecognised names map to [`FieldType::Other`].
    pub fn parse(value: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == value)
            .unwrap_or(Self::Other)
    }
}

impl From<String> for FieldType {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Validation rules and conditionals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    MinLength,
    MaxLength,
    Min,
    Max,
    Pattern,
}

/// A single declarative validation rule attached to a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(rename = "type")]
    pub kind: RuleKind,
    pub value: serde_json::Value,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
}

/// Show a field only when another field's value satisfies the condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCondition {
    pub field: String,
    pub operator: ConditionOperator,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub label: String,
    pub value: String,
}

// ---------------------------------------------------------------------------
// Field and form definition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation: Vec<ValidationRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional: Option<FieldCondition>,
}

impl FieldDef {
    /// Convenience constructor used by tests and template generation.
    pub fn new(key: &str, label: &str, field_type: FieldType) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            field_type,
            required: false,
            description: None,
            options: Vec::new(),
            validation: Vec::new(),
            conditional: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// The field list of one form version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormDefinition {
    pub fields: Vec<FieldDef>,
}

impl FormDefinition {
    /// Parse a stored form version definition.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, CoreError> {
        serde_json::from_value(value.clone())
            .map_err(|e| CoreError::Validation(format!("Invalid form definition: {e}")))
    }

    /// Keys of all `file` fields, in declaration order.
    pub fn file_field_keys(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.field_type == FieldType::File)
            .map(|f| f.key.as_str())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Field key to definition index built once per run.
#[derive(Debug, Clone)]
pub struct FieldLookup<'a> {
    by_key: HashMap<&'a str, &'a FieldDef>,
}

impl<'a> FieldLookup<'a> {
    pub fn new(definition: &'a FormDefinition) -> Self {
        let by_key = definition
            .fields
            .iter()
            .map(|f| (f.key.as_str(), f))
            .collect();
        Self { by_key }
    }

    pub fn get(&self, key: &str) -> Option<&'a FieldDef> {
        self.by_key.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn definition_parses_with_defaults() {
        let def = FormDefinition::from_json(&json!({
            "fields": [
                { "key": "email", "label": "Email", "type": "email", "required": true },
                { "key": "notes", "label": "Notes", "type": "rich_text" },
                { "key": "sig", "label": "Signature", "type": "signature_pad" }
            ]
        }))
        .unwrap();

        assert_eq!(def.fields.len(), 3);
        assert!(def.fields[0].required);
        assert_eq!(def.fields[1].field_type, FieldType::RichText);
        assert!(!def.fields[1].required);
        assert_eq!(def.fields[2].field_type, FieldType::Other);
    }

    #[test]
    fn malformed_definition_is_validation_error() {
        let err = FormDefinition::from_json(&json!({ "fields": "nope" })).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn lookup_finds_fields_by_key() {
        let def = FormDefinition {
            fields: vec![
                FieldDef::new("fullName", "Full Name", FieldType::Text),
                FieldDef::new("resume", "Resume", FieldType::File),
            ],
        };
        let lookup = FieldLookup::new(&def);
        assert_eq!(lookup.get("fullName").map(|f| f.field_type), Some(FieldType::Text));
        assert!(!lookup.contains("missing"));
        assert_eq!(def.file_field_keys(), vec!["resume"]);
    }

    #[test]
    fn field_type_round_trips_through_strings() {
        for t in FieldType::ALL {
            assert_eq!(FieldType::parse(t.as_str()), *t);
        }
    }
}
