//! Mapping template management and template file downloads.

use serde::Deserialize;
use serde_json::json;
use sheetport_core::audit::{action_types, entity_types};
use sheetport_core::error::CoreError;
use sheetport_core::imports::mapping::ColumnMapping;
use sheetport_core::imports::mapping_template::{
    validate_description, validate_mappings, validate_template_name, TemplateOwner,
};
use sheetport_core::imports::template_file::{
    generate_template, GeneratedTemplate, TemplateColumns, TemplateFormat, TemplateOptions,
};
use sheetport_core::types::DbId;
use sheetport_db::models::mapping_template::{
    CreateMappingTemplate, MappingTemplate, UpdateMappingTemplate,
};

use crate::context::{audit_entry, Actor, ImportContext};
use crate::error::PipelineError;
use crate::forms::{load_form, load_template_mapping};
use crate::ports::TemplateScope;

async fn require_owner(
    ctx: &ImportContext,
    actor: &Actor,
    owner: TemplateOwner,
) -> Result<(), PipelineError> {
    match owner {
        TemplateOwner::Organization(id) => ctx.access.require_org_access(actor, id).await,
        TemplateOwner::Global => {
            if ctx.access.is_global_admin(actor).await? {
                Ok(())
            } else {
                Err(CoreError::Forbidden(
                    "Only administrators can manage global mapping templates".into(),
                )
                .into())
            }
        }
    }
}

/// Decode and check client-supplied mappings, returning the normalized JSON.
fn checked_mappings(value: &serde_json::Value) -> Result<serde_json::Value, CoreError> {
    let mapping: ColumnMapping = serde_json::from_value(value.clone()).map_err(|_| {
        CoreError::Validation("Mappings must be an object of column name to field key".into())
    })?;
    validate_mappings(&mapping)?;
    serde_json::to_value(&mapping).map_err(|e| CoreError::Internal(e.to_string()))
}

async fn load_template(ctx: &ImportContext, id: DbId) -> Result<MappingTemplate, PipelineError> {
    ctx.store
        .find_template(id)
        .await?
        .ok_or_else(|| CoreError::not_found("import_mapping_template", id).into())
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// For an organization: its templates plus global ones. Without one:
/// global templates, or every template for administrators.
pub async fn list_templates(
    ctx: &ImportContext,
    actor: &Actor,
    organization_id: Option<DbId>,
) -> Result<Vec<MappingTemplate>, PipelineError> {
    let scope = match organization_id {
        Some(id) => {
            ctx.access.require_org_access(actor, id).await?;
            TemplateScope::Organization(id)
        }
        None => {
            if ctx.access.is_global_admin(actor).await? {
                TemplateScope::All
            } else {
                TemplateScope::Global
            }
        }
    };
    Ok(ctx.store.list_templates(scope).await?)
}

pub async fn get_template(
    ctx: &ImportContext,
    actor: &Actor,
    id: DbId,
) -> Result<MappingTemplate, PipelineError> {
    let template = load_template(ctx, id).await?;
    if let Some(organization_id) = template.organization_id {
        ctx.access.require_org_access(actor, organization_id).await?;
    }
    Ok(template)
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

pub async fn create_template(
    ctx: &ImportContext,
    actor: &Actor,
    mut input: CreateMappingTemplate,
) -> Result<MappingTemplate, PipelineError> {
    require_owner(ctx, actor, TemplateOwner::from_organization(input.organization_id)).await?;

    input.name = validate_template_name(&input.name)?;
    validate_description(input.description.as_deref())?;
    input.mappings = checked_mappings(&input.mappings)?;

    let template = ctx.store.create_template(actor.user_id, &input).await?;

    tracing::info!(template_id = template.id, "Mapping template created");
    ctx.audit(audit_entry(
        actor,
        template.organization_id,
        action_types::IMPORT_TEMPLATE_CREATE,
        entity_types::IMPORT_MAPPING_TEMPLATE,
        Some(template.id),
        json!({ "name": template.name, "target_form_id": template.target_form_id }),
    ))
    .await;

    Ok(template)
}

pub async fn update_template(
    ctx: &ImportContext,
    actor: &Actor,
    id: DbId,
    mut patch: UpdateMappingTemplate,
) -> Result<MappingTemplate, PipelineError> {
    let existing = load_template(ctx, id).await?;
    require_owner(
        ctx,
        actor,
        TemplateOwner::from_organization(existing.organization_id),
    )
    .await?;

    if let Some(name) = patch.name.take() {
        patch.name = Some(validate_template_name(&name)?);
    }
    validate_description(patch.description.as_deref())?;
    if let Some(mappings) = patch.mappings.take() {
        patch.mappings = Some(checked_mappings(&mappings)?);
    }

    let template = ctx
        .store
        .update_template(id, &patch)
        .await?
        .ok_or_else(|| CoreError::not_found("import_mapping_template", id))?;

    ctx.audit(audit_entry(
        actor,
        template.organization_id,
        action_types::IMPORT_TEMPLATE_UPDATE,
        entity_types::IMPORT_MAPPING_TEMPLATE,
        Some(id),
        json!({
            "name_changed": patch.name.is_some(),
            "mappings_changed": patch.mappings.is_some(),
        }),
    ))
    .await;

    Ok(template)
}

/// Jobs that referenced the template keep their results; only the
/// reference is cleared.
pub async fn delete_template(
    ctx: &ImportContext,
    actor: &Actor,
    id: DbId,
) -> Result<(), PipelineError> {
    let existing = load_template(ctx, id).await?;
    require_owner(
        ctx,
        actor,
        TemplateOwner::from_organization(existing.organization_id),
    )
    .await?;

    if !ctx.store.delete_template(id).await? {
        return Err(CoreError::not_found("import_mapping_template", id).into());
    }

    ctx.audit(audit_entry(
        actor,
        existing.organization_id,
        action_types::IMPORT_TEMPLATE_DELETE,
        entity_types::IMPORT_MAPPING_TEMPLATE,
        Some(id),
        json!({ "name": existing.name }),
    ))
    .await;

    Ok(())
}

// ---------------------------------------------------------------------------
// Template files
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateDownloadRequest {
    pub form_id: DbId,
    pub format: TemplateFormat,
    #[serde(default)]
    pub options: TemplateOptions,
    pub organization_id: Option<DbId>,
    /// Use a saved template's columns instead of every field.
    pub mapping_template_id: Option<DbId>,
}

/// Generate a blank spreadsheet template for a form.
pub async fn download_template(
    ctx: &ImportContext,
    actor: &Actor,
    request: &TemplateDownloadRequest,
) -> Result<GeneratedTemplate, PipelineError> {
    let store = ctx.store.as_ref();
    let form = load_form(store, request.form_id).await?;
    let organization_id = form.form.organization_id;
    if request
        .organization_id
        .is_some_and(|id| id != organization_id)
    {
        return Err(CoreError::Forbidden("Form belongs to a different organization".into()).into());
    }
    ctx.access.require_org_access(actor, organization_id).await?;

    let columns = match request.mapping_template_id {
        Some(template_id) => {
            let (_, mapping) = load_template_mapping(store, template_id, organization_id).await?;
            TemplateColumns::Mapping(mapping)
        }
        None => TemplateColumns::AllFields,
    };

    Ok(generate_template(
        &form.definition,
        &form.form.name,
        request.format,
        request.options,
        &columns,
        None,
    )?)
}
