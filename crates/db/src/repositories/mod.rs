//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod audit_repo;
pub mod form_repo;
pub mod identity_repo;
pub mod import_job_error_repo;
pub mod import_job_repo;
pub mod mapping_template_repo;
pub mod submission_repo;

pub use audit_repo::AuditLogRepo;
pub use form_repo::FormRepo;
pub use identity_repo::{OrganizationMemberRepo, UserRepo};
pub use import_job_error_repo::ImportJobErrorRepo;
pub use import_job_repo::{ImportJobRepo, RolledBackJob};
pub use mapping_template_repo::MappingTemplateRepo;
pub use submission_repo::SubmissionRepo;
