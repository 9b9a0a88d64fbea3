//! Loading the target form and mapping templates an import runs against.

use sheetport_core::error::CoreError;
use sheetport_core::imports::field::FormDefinition;
use sheetport_core::imports::mapping::ColumnMapping;
use sheetport_core::imports::mapping_template::parse_mappings;
use sheetport_core::types::DbId;
use sheetport_db::models::form::{Form, FormVersion};
use sheetport_db::models::mapping_template::MappingTemplate;

use crate::error::PipelineError;
use crate::ports::ImportStore;

/// A form, its latest published version and the parsed field list.
#[derive(Debug, Clone)]
pub struct LoadedForm {
    pub form: Form,
    pub version: FormVersion,
    pub definition: FormDefinition,
}

pub async fn load_form(store: &dyn ImportStore, form_id: DbId) -> Result<LoadedForm, PipelineError> {
    let form = store
        .find_form(form_id)
        .await?
        .ok_or_else(|| CoreError::not_found("form", form_id))?;
    let version = store
        .latest_form_version(form_id)
        .await?
        .ok_or_else(|| CoreError::not_found("published form version", form_id))?;
    let definition = FormDefinition::from_json(&version.definition)?;
    Ok(LoadedForm {
        form,
        version,
        definition,
    })
}

/// Load a form and require it to belong to `organization_id`.
pub async fn load_org_form(
    store: &dyn ImportStore,
    form_id: DbId,
    organization_id: DbId,
) -> Result<LoadedForm, PipelineError> {
    let loaded = load_form(store, form_id).await?;
    if loaded.form.organization_id != organization_id {
        return Err(CoreError::Forbidden("Form belongs to a different organization".into()).into());
    }
    Ok(loaded)
}

/// Load a template usable by `organization_id` (its own or a global one)
/// and parse its mappings.
pub async fn load_template_mapping(
    store: &dyn ImportStore,
    template_id: DbId,
    organization_id: DbId,
) -> Result<(MappingTemplate, ColumnMapping), PipelineError> {
    let template = store
        .find_template(template_id)
        .await?
        .ok_or_else(|| CoreError::not_found("import_mapping_template", template_id))?;
    if template
        .organization_id
        .is_some_and(|owner| owner != organization_id)
    {
        return Err(CoreError::Forbidden(
            "Mapping template belongs to a different organization".into(),
        )
        .into());
    }
    let mapping = parse_mappings(&template.mappings)?;
    Ok((template, mapping))
}
