use std::time::Duration;

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    /// Bucket holding uploaded sources and error reports.
    pub artifacts_bucket: String,
    /// How long the poller sleeps when no job is waiting.
    pub poll_interval: Duration,
    /// Rows imported between progress checkpoints.
    pub chunk_size: usize,
}

/// Default number of rows per checkpointed chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default    |
    /// |-----------------------------|------------|
    /// | `DATABASE_URL`              | (required) |
    /// | `ARTIFACTS_BUCKET`          | (required) |
    /// | `WORKER_POLL_INTERVAL_SECS` | `5`        |
    /// | `BATCH_CHUNK_SIZE`          | `1000`     |
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let artifacts_bucket =
            std::env::var("ARTIFACTS_BUCKET").expect("ARTIFACTS_BUCKET must be set");

        let poll_interval_secs: u64 = std::env::var("WORKER_POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("WORKER_POLL_INTERVAL_SECS must be a valid u64");

        Self {
            database_url,
            artifacts_bucket,
            poll_interval: Duration::from_secs(poll_interval_secs.max(1)),
            chunk_size: chunk_size_from_env(),
        }
    }
}

/// `BATCH_CHUNK_SIZE`, shared with the API's inline batch mode.
pub fn chunk_size_from_env() -> usize {
    let size: usize = std::env::var("BATCH_CHUNK_SIZE")
        .unwrap_or_else(|_| DEFAULT_CHUNK_SIZE.to_string())
        .parse()
        .expect("BATCH_CHUNK_SIZE must be a valid usize");
    size.max(1)
}
