//! Form and form version models. Imports read these; they never write them.

use serde::Serialize;
use sheetport_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `forms` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Form {
    pub id: DbId,
    pub organization_id: DbId,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `form_versions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FormVersion {
    pub id: DbId,
    pub form_id: DbId,
    pub version_number: i32,
    /// `{"fields": [...]}`, parsed by `FormDefinition::from_json`.
    pub definition: serde_json::Value,
    pub published_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
