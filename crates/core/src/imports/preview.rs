//! Editable preview of an upload with autofix undo history.
//!
//! Each applied autofix pushes a full snapshot of rows, mapping and the
//! edited-cell set; undo pops it back verbatim.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

use crate::error::CoreError;
use crate::imports::analyzer::CategorizedError;
use crate::imports::autofix::{apply_fix, apply_mapping_fix, CellChange};
use crate::imports::mapping::ColumnMapping;
use crate::types::JsonRecord;

/// Oldest snapshots are dropped beyond this depth.
pub const MAX_UNDO_DEPTH: usize = 20;

/// A cell touched by an edit or autofix. `row` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CellRef {
    pub row: usize,
    pub column: String,
}

#[derive(Debug, Clone)]
struct Snapshot {
    rows: Vec<JsonRecord>,
    mapping: ColumnMapping,
    edited_cells: BTreeSet<CellRef>,
}

#[derive(Debug, Clone)]
pub struct PreviewSession {
    rows: Vec<JsonRecord>,
    mapping: ColumnMapping,
    edited_cells: BTreeSet<CellRef>,
    history: Vec<Snapshot>,
}

impl PreviewSession {
    pub fn new(rows: Vec<JsonRecord>, mapping: ColumnMapping) -> Self {
        Self {
            rows,
            mapping,
            edited_cells: BTreeSet::new(),
            history: Vec::new(),
        }
    }

    pub fn rows(&self) -> &[JsonRecord] {
        &self.rows
    }

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    pub fn edited_cells(&self) -> &BTreeSet<CellRef> {
        &self.edited_cells
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    /// Manually overwrite one cell and mark it edited.
    pub fn edit_cell(&mut self, row: usize, column: &str, value: Value) -> Result<(), CoreError> {
        let target = row
            .checked_sub(1)
            .and_then(|i| self.rows.get_mut(i))
            .ok_or_else(|| CoreError::Validation(format!("Row {row} is outside the preview")))?;
        target.insert(column.to_string(), value);
        self.edited_cells.insert(CellRef {
            row,
            column: column.to_string(),
        });
        Ok(())
    }

    /// Apply the autofix attached to `error`, recording an undo snapshot.
    pub fn apply(&mut self, error: &CategorizedError) -> Result<Vec<CellChange>, CoreError> {
        let autofix = error
            .autofix
            .as_ref()
            .ok_or_else(|| CoreError::Validation("No autofix available for this error".into()))?;

        if autofix.fix.is_mapping_fix() {
            let mapping = apply_mapping_fix(&self.mapping, &autofix.fix)
                .ok_or_else(|| CoreError::Internal("Mapping fix did not produce a mapping".into()))?;
            self.push_snapshot();
            self.mapping = mapping;
            return Ok(Vec::new());
        }

        let result = apply_fix(&self.rows, &autofix.fix);
        if !result.success {
            return Err(CoreError::Validation(
                result.error.unwrap_or_else(|| "Autofix failed".into()),
            ));
        }
        self.push_snapshot();
        self.rows = result.rows;
        for change in &result.changes {
            self.edited_cells.insert(CellRef {
                row: change.row,
                column: change.column.clone(),
            });
        }
        Ok(result.changes)
    }

    /// Restore the state before the most recent autofix. Returns `false`
    /// when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.history.pop() {
            Some(snapshot) => {
                self.rows = snapshot.rows;
                self.mapping = snapshot.mapping;
                self.edited_cells = snapshot.edited_cells;
                true
            }
            None => false,
        }
    }

    pub fn into_parts(self) -> (Vec<JsonRecord>, ColumnMapping) {
        (self.rows, self.mapping)
    }

    fn push_snapshot(&mut self) {
        if self.history.len() == MAX_UNDO_DEPTH {
            self.history.remove(0);
        }
        self.history.push(Snapshot {
            rows: self.rows.clone(),
            mapping: self.mapping.clone(),
            edited_cells: self.edited_cells.clone(),
        });
    }
}
