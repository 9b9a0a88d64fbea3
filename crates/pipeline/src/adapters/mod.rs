//! Implementations of the pipeline ports.
//!
//! - [`pg`]: Postgres-backed store, access guard and audit sink
//! - [`s3`]: S3 object storage
//! - [`memory`]: in-process versions used by tests and local runs
//! - [`queue`]: dispatcher that leaves batch jobs for the worker

pub mod memory;
pub mod pg;
pub mod queue;
pub mod s3;
