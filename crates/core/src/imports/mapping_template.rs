//! Saved column-mapping templates: input rules and ownership.

use crate::error::CoreError;
use crate::imports::mapping::ColumnMapping;
use crate::types::DbId;

pub const MAX_TEMPLATE_NAME_LEN: usize = 200;
pub const MAX_TEMPLATE_DESCRIPTION_LEN: usize = 2_000;
pub const MAX_TEMPLATE_MAPPINGS: usize = 500;

/// Who may manage a template. Organization-less templates are global and
/// only global administrators may change them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateOwner {
    Organization(DbId),
    Global,
}

impl TemplateOwner {
    pub fn from_organization(organization_id: Option<DbId>) -> Self {
        organization_id.map_or(Self::Global, Self::Organization)
    }
}

/// Trimmed, non-empty, bounded template name.
pub fn validate_template_name(name: &str) -> Result<String, CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Template name is required".into()));
    }
    if trimmed.chars().count() > MAX_TEMPLATE_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Template name must be at most {MAX_TEMPLATE_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

pub fn validate_description(description: Option<&str>) -> Result<(), CoreError> {
    match description {
        Some(d) if d.chars().count() > MAX_TEMPLATE_DESCRIPTION_LEN => Err(CoreError::Validation(
            format!("Description must be at most {MAX_TEMPLATE_DESCRIPTION_LEN} characters"),
        )),
        _ => Ok(()),
    }
}

/// Column names must be non-blank; field keys may be blank (ignored column).
pub fn validate_mappings(mappings: &ColumnMapping) -> Result<(), CoreError> {
    if mappings.len() > MAX_TEMPLATE_MAPPINGS {
        return Err(CoreError::Validation(format!(
            "A template may map at most {MAX_TEMPLATE_MAPPINGS} columns"
        )));
    }
    if mappings.keys().any(|column| column.trim().is_empty()) {
        return Err(CoreError::Validation("Mapped column names cannot be blank".into()));
    }
    Ok(())
}

/// Decode a stored `mappings` JSON object.
pub fn parse_mappings(value: &serde_json::Value) -> Result<ColumnMapping, CoreError> {
    serde_json::from_value(value.clone())
        .map_err(|e| CoreError::Internal(format!("Stored template mappings are malformed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn name_is_trimmed_and_bounded() {
        assert_eq!(validate_template_name("  Members  ").unwrap(), "Members");
        assert!(validate_template_name("   ").is_err());
        assert!(validate_template_name(&"x".repeat(201)).is_err());
    }

    #[test]
    fn blank_column_names_are_rejected() {
        let mut mappings = ColumnMapping::new();
        mappings.insert("Email".into(), "email".into());
        mappings.insert("Notes".into(), String::new());
        assert!(validate_mappings(&mappings).is_ok());
        mappings.insert(" ".into(), "fullName".into());
        assert!(validate_mappings(&mappings).is_err());
    }

    #[test]
    fn stored_mappings_keep_order() {
        let parsed = parse_mappings(&json!({ "B": "b", "A": "a" })).unwrap();
        assert_eq!(parsed.len(), 2);
        assert!(parse_mappings(&json!(["nope"])).is_err());
    }

    #[test]
    fn owner_follows_organization() {
        assert_eq!(TemplateOwner::from_organization(Some(4)), TemplateOwner::Organization(4));
        assert_eq!(TemplateOwner::from_organization(None), TemplateOwner::Global);
    }
}
