use async_trait::async_trait;
use sheetport_db::models::import_job::ImportJob;

use crate::error::PipelineError;
use crate::ports::{BatchDispatch, BatchDispatcher};

/// Leaves validated batch jobs in the table for a worker's poller to claim.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueDispatcher;

#[async_trait]
impl BatchDispatcher for QueueDispatcher {
    async fn dispatch(&self, job: &ImportJob) -> Result<BatchDispatch, PipelineError> {
        tracing::info!(job_id = job.id, "Batch import queued for worker");
        Ok(BatchDispatch::Queued)
    }
}
