//! Pre-import preview: resolve the mapping, analyze the rows and apply
//! suggested autofixes.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use sheetport_core::error::CoreError;
use sheetport_core::imports::analyzer::{
    analyze, AnalysisContext, AnalysisInput, AnalysisResult, CategorizedError,
};
use sheetport_core::imports::autofix::CellChange;
use sheetport_core::imports::field::FieldLookup;
use sheetport_core::imports::mapping::{resolve, ColumnMapping};
use sheetport_core::imports::preview::PreviewSession;
use sheetport_core::imports::row::{evaluate_row, RowError, RowOutcome};
use sheetport_core::imports::transform::transform_row;
use sheetport_core::imports::validate::{sanitize_payload, validate_payload};
use sheetport_core::types::{DbId, JsonRecord};

use crate::context::{Actor, ImportContext};
use crate::error::PipelineError;
use crate::forms::{load_org_form, load_template_mapping};

/// Rows returned with per-row detail; analysis still covers every row.
pub const PREVIEW_ROW_LIMIT: usize = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct PreviewRequest {
    pub organization_id: DbId,
    pub form_id: DbId,
    pub headers: Vec<String>,
    pub rows: Vec<JsonRecord>,
    /// Manual assignments; they win over auto-mapping and the template.
    #[serde(default)]
    pub overrides: ColumnMapping,
    pub mapping_template_id: Option<DbId>,
    /// Accepted values per field key for reference checks.
    #[serde(default)]
    pub known_references: HashMap<String, HashSet<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RowPreview {
    pub row_number: i32,
    pub payload: JsonRecord,
    pub completeness_score: f64,
    pub errors: Vec<RowError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewReport {
    pub mapping: ColumnMapping,
    pub analysis: AnalysisResult,
    pub rows: Vec<RowPreview>,
}

pub async fn preview_import(
    ctx: &ImportContext,
    actor: &Actor,
    request: PreviewRequest,
) -> Result<PreviewReport, PipelineError> {
    ctx.access
        .require_org_access(actor, request.organization_id)
        .await?;
    let store = ctx.store.as_ref();
    let form = load_org_form(store, request.form_id, request.organization_id).await?;

    let template = match request.mapping_template_id {
        Some(id) => Some(load_template_mapping(store, id, request.organization_id).await?.1),
        None => None,
    };
    let mapping = resolve(
        &request.headers,
        &form.definition.fields,
        template.as_ref(),
        &request.overrides,
    );

    let context = AnalysisContext {
        organization_id: Some(request.organization_id),
        known_references: request.known_references,
    };
    let analysis = analyze(&AnalysisInput {
        headers: &request.headers,
        rows: &request.rows,
        definition: &form.definition,
        mapping: &mapping,
        context: &context,
    });

    let lookup = FieldLookup::new(&form.definition);
    let rows = request
        .rows
        .iter()
        .take(PREVIEW_ROW_LIMIT)
        .enumerate()
        .map(|(index, row)| {
            let row_number = index as i32 + 1;
            let transformed = transform_row(row, &mapping, &lookup);
            let payload = sanitize_payload(&form.definition, &transformed.payload);
            let completeness_score = validate_payload(&form.definition, &payload).completeness_score;
            let errors = match evaluate_row(&form.definition, &lookup, &mapping, row, row_number) {
                RowOutcome::Accepted(_) => Vec::new(),
                RowOutcome::Rejected(errors) => errors,
            };
            RowPreview {
                row_number,
                payload,
                completeness_score,
                errors,
            }
        })
        .collect();

    tracing::debug!(
        form_id = request.form_id,
        rows = request.rows.len(),
        errors = analysis.errors.len(),
        can_proceed = analysis.can_proceed,
        "Import preview analyzed"
    );

    Ok(PreviewReport {
        mapping,
        analysis,
        rows,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplyFixRequest {
    pub rows: Vec<JsonRecord>,
    pub mapping: ColumnMapping,
    pub error: CategorizedError,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyFixResult {
    pub rows: Vec<JsonRecord>,
    pub mapping: ColumnMapping,
    pub changes: Vec<CellChange>,
}

/// Apply one finding's autofix to a client-held preview. The client keeps
/// the previous rows and mapping as its undo snapshot.
pub fn apply_fix(request: ApplyFixRequest) -> Result<ApplyFixResult, CoreError> {
    let mut session = PreviewSession::new(request.rows, request.mapping);
    let changes = session.apply(&request.error)?;
    let (rows, mapping) = session.into_parts();
    Ok(ApplyFixResult {
        rows,
        mapping,
        changes,
    })
}
