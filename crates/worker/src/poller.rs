//! Polls for validated batch jobs and processes them one at a time.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::processor::BatchProcessor;

/// Run the claim loop until `cancel` fires.
///
/// Each tick drains every waiting job before sleeping again. A job that
/// is mid-run when cancellation arrives is finished first.
pub async fn run(processor: Arc<BatchProcessor>, poll_interval: Duration, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = poll_interval.as_secs(),
        "Batch poller started"
    );

    let mut interval = tokio::time::interval(poll_interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Batch poller stopping");
                break;
            }
            _ = interval.tick() => {
                let processed = drain(&processor, &cancel).await;
                if processed > 0 {
                    tracing::info!(processed, "Batch poller: processed jobs");
                } else {
                    tracing::debug!("Batch poller: no jobs waiting");
                }
            }
        }
    }
}

/// Claim and process jobs until none is waiting. Returns how many ran.
pub async fn drain(processor: &BatchProcessor, cancel: &CancellationToken) -> usize {
    let mut processed = 0;
    while !cancel.is_cancelled() {
        match processor.store().claim_next_batch().await {
            Ok(Some(job)) => {
                // Failures are already recorded on the job.
                let _ = processor.process(job).await;
                processed += 1;
            }
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "Batch poller: failed to claim a job");
                break;
            }
        }
    }
    processed
}
