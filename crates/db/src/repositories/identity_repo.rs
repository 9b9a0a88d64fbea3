//! Membership and role lookups backing organization-scoped authorization.

use sqlx::PgPool;
use sheetport_core::types::DbId;

pub struct UserRepo;

impl UserRepo {
    /// Role of an active user, `None` if the user is unknown or inactive.
    pub async fn find_role(pool: &PgPool, user_id: DbId) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT role FROM users WHERE id = $1 AND is_active")
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }
}

pub struct OrganizationMemberRepo;

impl OrganizationMemberRepo {
    pub async fn is_active_member(
        pool: &PgPool,
        organization_id: DbId,
        user_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                SELECT 1 FROM organization_members
                WHERE organization_id = $1 AND user_id = $2 AND is_active
             )",
        )
        .bind(organization_id)
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    pub async fn organization_ids_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>(
            "SELECT organization_id FROM organization_members
             WHERE user_id = $1 AND is_active
             ORDER BY organization_id",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}
