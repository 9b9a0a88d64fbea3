//! Asynchronous batch import processing.
//!
//! The poller claims `validated` batch jobs, and the [`BatchProcessor`]
//! imports them in checkpointed chunks. [`InlineDispatcher`] runs the same
//! processor inside the API process instead.

pub mod config;
pub mod dispatch;
pub mod poller;
pub mod processor;
pub mod report;
pub mod source;

pub use config::WorkerConfig;
pub use dispatch::InlineDispatcher;
pub use processor::BatchProcessor;
