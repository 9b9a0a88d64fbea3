use sheetport_core::error::CoreError;

/// Errors from pipeline services.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl PipelineError {
    /// The domain error, if this is one.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            Self::Core(err) => Some(err),
            _ => None,
        }
    }

    /// Short machine-readable reason recorded on a job failed by this error.
    pub fn failure_reason(&self) -> &'static str {
        match self {
            Self::Database(_) => "database_error",
            Self::Storage(_) => "storage_error",
            Self::Core(CoreError::Conflict(_)) => "job_modified",
            Self::Core(CoreError::NotFound { .. }) => "missing_configuration",
            Self::Core(_) => "internal_error",
        }
    }
}
