//! Import orchestration.
//!
//! Every entry point takes an [`ImportContext`](context::ImportContext)
//! carrying the store, access guard, object storage, audit sink and batch
//! dispatcher, so the same services run against Postgres/S3 in production
//! and against the in-memory adapters in tests.

pub mod adapters;
pub mod batch;
pub mod context;
pub mod error;
pub mod forms;
pub mod importer;
pub mod interactive;
pub mod jobs;
pub mod ports;
pub mod preview;
pub mod rollback;
pub mod templates;
pub mod uploads;

pub use context::{Actor, ImportContext, PipelineSettings};
pub use error::PipelineError;
