//! Repository for the `import_mapping_templates` table.

use sqlx::PgPool;
use sheetport_core::types::DbId;

use crate::models::mapping_template::{
    CreateMappingTemplate, MappingTemplate, UpdateMappingTemplate,
};

const COLUMNS: &str = "id, organization_id, name, description, target_form_id, \
    target_form_version_id, mappings, created_by, created_at, updated_at";

pub struct MappingTemplateRepo;

impl MappingTemplateRepo {
    pub async fn create(
        pool: &PgPool,
        created_by: DbId,
        input: &CreateMappingTemplate,
    ) -> Result<MappingTemplate, sqlx::Error> {
        let query = format!(
            "INSERT INTO import_mapping_templates
                (organization_id, name, description, target_form_id, target_form_version_id,
                 mappings, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MappingTemplate>(&query)
            .bind(input.organization_id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(input.target_form_id)
            .bind(input.target_form_version_id)
            .bind(&input.mappings)
            .bind(created_by)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<MappingTemplate>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM import_mapping_templates WHERE id = $1");
        sqlx::query_as::<_, MappingTemplate>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Patch a template. Only non-`None` fields are applied.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateMappingTemplate,
    ) -> Result<Option<MappingTemplate>, sqlx::Error> {
        let query = format!(
            "UPDATE import_mapping_templates SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                target_form_id = COALESCE($4, target_form_id),
                target_form_version_id = COALESCE($5, target_form_version_id),
                mappings = COALESCE($6, mappings)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MappingTemplate>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(input.target_form_id)
            .bind(input.target_form_version_id)
            .bind(&input.mappings)
            .fetch_optional(pool)
            .await
    }

    /// Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM import_mapping_templates WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Templates visible to one organization: its own plus global ones.
    pub async fn list_for_organization(
        pool: &PgPool,
        organization_id: DbId,
    ) -> Result<Vec<MappingTemplate>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM import_mapping_templates
             WHERE organization_id = $1 OR organization_id IS NULL
             ORDER BY name, id"
        );
        sqlx::query_as::<_, MappingTemplate>(&query)
            .bind(organization_id)
            .fetch_all(pool)
            .await
    }

    /// Global templates only, or every template when `include_all`.
    pub async fn list_unscoped(
        pool: &PgPool,
        include_all: bool,
    ) -> Result<Vec<MappingTemplate>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM import_mapping_templates
             WHERE $1 OR organization_id IS NULL
             ORDER BY name, id"
        );
        sqlx::query_as::<_, MappingTemplate>(&query)
            .bind(include_all)
            .fetch_all(pool)
            .await
    }
}
