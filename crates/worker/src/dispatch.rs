use std::sync::Arc;

use async_trait::async_trait;
use sheetport_db::models::import_job::ImportJob;
use sheetport_pipeline::ports::{BatchDispatch, BatchDispatcher};
use sheetport_pipeline::PipelineError;

use crate::processor::BatchProcessor;

/// Processes validated batch jobs on a background task in this process.
pub struct InlineDispatcher {
    processor: Arc<BatchProcessor>,
}

impl InlineDispatcher {
    pub fn new(processor: Arc<BatchProcessor>) -> Self {
        Self { processor }
    }
}

#[async_trait]
impl BatchDispatcher for InlineDispatcher {
    async fn dispatch(&self, job: &ImportJob) -> Result<BatchDispatch, PipelineError> {
        let processor = Arc::clone(&self.processor);
        let job = job.clone();
        tokio::spawn(async move {
            if let Err(e) = processor.start(&job).await {
                tracing::error!(job_id = job.id, error = %e, "Inline batch import failed");
            }
        });
        Ok(BatchDispatch::Started)
    }
}
