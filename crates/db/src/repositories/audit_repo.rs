//! Repository for the `audit_logs` table.

use sqlx::PgPool;
use sheetport_core::audit::{compute_integrity_hash, redact_sensitive_fields};

use crate::models::audit::{AuditLog, CreateAuditLog};

const COLUMNS: &str = "id, timestamp, user_id, organization_id, action_type, entity_type, \
    entity_id, details_json, integrity_hash, created_at";

/// Serialises writers so each entry chains to the true predecessor.
const CHAIN_LOCK_KEY: i64 = 0x5348_4545_5450_4f52;

pub struct AuditLogRepo;

impl AuditLogRepo {
    /// Append one entry, redacting sensitive details and chaining its hash
    /// to the most recent entry.
    pub async fn insert(pool: &PgPool, entry: &CreateAuditLog) -> Result<AuditLog, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(CHAIN_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        let prev_hash: Option<String> = sqlx::query_scalar(
            "SELECT integrity_hash FROM audit_logs ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&mut *tx)
        .await?
        .flatten();

        let details = entry.details_json.as_ref().map(redact_sensitive_fields);
        let entry_data = format!(
            "{}|{}|{}|{}|{}",
            entry.action_type,
            entry.entity_type.as_deref().unwrap_or(""),
            entry.entity_id.map(|id| id.to_string()).unwrap_or_default(),
            entry.user_id.map(|id| id.to_string()).unwrap_or_default(),
            details.as_ref().map(|d| d.to_string()).unwrap_or_default(),
        );
        let hash = compute_integrity_hash(prev_hash.as_deref(), &entry_data);

        let query = format!(
            "INSERT INTO audit_logs
                (user_id, organization_id, action_type, entity_type, entity_id, details_json,
                 integrity_hash)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, AuditLog>(&query)
            .bind(entry.user_id)
            .bind(entry.organization_id)
            .bind(&entry.action_type)
            .bind(&entry.entity_type)
            .bind(entry.entity_id)
            .bind(&details)
            .bind(&hash)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row)
    }
}
