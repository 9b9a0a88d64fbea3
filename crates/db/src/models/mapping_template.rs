//! Mapping template models.

use serde::{Deserialize, Serialize};
use sheetport_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `import_mapping_templates` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MappingTemplate {
    pub id: DbId,
    /// `None` for global templates.
    pub organization_id: Option<DbId>,
    pub name: String,
    pub description: Option<String>,
    pub target_form_id: Option<DbId>,
    pub target_form_version_id: Option<DbId>,
    /// Ordered `{column: field_key}` object.
    pub mappings: serde_json::Value,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a mapping template.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMappingTemplate {
    pub organization_id: Option<DbId>,
    pub name: String,
    pub description: Option<String>,
    pub target_form_id: Option<DbId>,
    pub target_form_version_id: Option<DbId>,
    pub mappings: serde_json::Value,
}

/// DTO for patching a mapping template. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMappingTemplate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub target_form_id: Option<DbId>,
    pub target_form_version_id: Option<DbId>,
    pub mappings: Option<serde_json::Value>,
}
