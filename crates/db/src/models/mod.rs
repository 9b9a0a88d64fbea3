//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts
//! - A `Deserialize` update DTO (all `Option` fields) for patches, where
//!   the table supports updates

pub mod audit;
pub mod form;
pub mod import_job;
pub mod import_job_error;
pub mod mapping_template;
pub mod submission;
