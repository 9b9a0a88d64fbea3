//! Read access to `forms` and `form_versions`.

use sqlx::PgPool;
use sheetport_core::types::DbId;

use crate::models::form::{Form, FormVersion};

const FORM_COLUMNS: &str = "id, organization_id, name, created_at, updated_at";

const VERSION_COLUMNS: &str =
    "id, form_id, version_number, definition, published_at, created_at, updated_at";

pub struct FormRepo;

impl FormRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Form>, sqlx::Error> {
        let query = format!("SELECT {FORM_COLUMNS} FROM forms WHERE id = $1");
        sqlx::query_as::<_, Form>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Highest-numbered published version of a form.
    pub async fn latest_published_version(
        pool: &PgPool,
        form_id: DbId,
    ) -> Result<Option<FormVersion>, sqlx::Error> {
        let query = format!(
            "SELECT {VERSION_COLUMNS} FROM form_versions
             WHERE form_id = $1 AND published_at IS NOT NULL
             ORDER BY version_number DESC
             LIMIT 1"
        );
        sqlx::query_as::<_, FormVersion>(&query)
            .bind(form_id)
            .fetch_optional(pool)
            .await
    }
}
