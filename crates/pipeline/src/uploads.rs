//! Upload handshake: issue a storage key and a short-lived signed PUT URL.

use serde::{Deserialize, Serialize};
use serde_json::json;
use sheetport_core::audit::{action_types, entity_types};
use sheetport_core::imports::upload::{upload_storage_key, validate_upload_request};
use sheetport_core::types::{DbId, Timestamp};

use crate::context::{audit_entry, Actor, ImportContext};
use crate::error::PipelineError;

#[derive(Debug, Clone, Deserialize)]
pub struct UploadRequest {
    pub organization_id: DbId,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadTicket {
    pub storage_key: String,
    pub upload_url: String,
    pub expires_at: Timestamp,
}

pub async fn create_upload(
    ctx: &ImportContext,
    actor: &Actor,
    request: &UploadRequest,
) -> Result<UploadTicket, PipelineError> {
    ctx.access
        .require_org_access(actor, request.organization_id)
        .await?;
    validate_upload_request(&request.file_name, request.size_bytes)?;

    let random_id = uuid::Uuid::new_v4().simple().to_string();
    let storage_key = upload_storage_key(request.organization_id, &random_id, &request.file_name);
    let ttl = ctx.settings.upload_url_ttl;
    let upload_url = ctx
        .storage
        .presign_put(&storage_key, &request.content_type, ttl)
        .await?;
    let expires_at = ctx.now()
        + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::seconds(0));

    ctx.audit(audit_entry(
        actor,
        Some(request.organization_id),
        action_types::IMPORT_UPLOAD_INIT,
        entity_types::IMPORT_UPLOAD,
        None,
        json!({
            "storage_key": storage_key,
            "file_name": request.file_name,
            "size_bytes": request.size_bytes,
        }),
    ))
    .await;

    Ok(UploadTicket {
        storage_key,
        upload_url,
        expires_at,
    })
}
