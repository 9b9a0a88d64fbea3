//! Spreadsheet import domain: mapping, transformation, validation,
//! error analysis, autofix, and the import job lifecycle.

pub mod analyzer;
pub mod autofix;
pub mod field;
pub mod job;
pub mod mapping;
pub mod mapping_template;
pub mod patterns;
pub mod preview;
pub mod row;
pub mod template_file;
pub mod transform;
pub mod upload;
pub mod validate;

pub use field::{FieldDef, FieldLookup, FieldType, FormDefinition};
pub use mapping::ColumnMapping;
