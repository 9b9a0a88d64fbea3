use std::time::Duration;

use sheetport_core::imports::job::DEFAULT_ROLLBACK_WINDOW_DAYS;
use sheetport_core::imports::upload::DEFAULT_UPLOAD_URL_TTL_SECS;
use sheetport_pipeline::PipelineSettings;

use crate::auth::jwt::JwtConfig;

/// Where validated batch jobs go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    /// Process in this process on a background task.
    Inline,
    /// Leave for the worker's poller.
    Queue,
}

impl BatchMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inline" => Some(Self::Inline),
            "queue" => Some(Self::Queue),
            _ => None,
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields except the secrets and bucket have defaults suitable for
/// local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    pub jwt: JwtConfig,
    /// When false every import route answers 403.
    pub imports_enabled: bool,
    pub rollback_window_days: i64,
    pub upload_url_ttl_secs: u64,
    pub artifacts_bucket: String,
    pub batch_mode: BatchMode,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `IMPORTS_ENABLED`      | `true`                     |
    /// | `ROLLBACK_WINDOW_DAYS` | `7`                        |
    /// | `UPLOAD_URL_TTL_SECS`  | `900`                      |
    /// | `ARTIFACTS_BUCKET`     | (required)                 |
    /// | `BATCH_MODE`           | `queue`                    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let imports_enabled: bool = std::env::var("IMPORTS_ENABLED")
            .unwrap_or_else(|_| "true".into())
            .parse()
            .expect("IMPORTS_ENABLED must be true or false");

        let rollback_window_days: i64 = std::env::var("ROLLBACK_WINDOW_DAYS")
            .unwrap_or_else(|_| DEFAULT_ROLLBACK_WINDOW_DAYS.to_string())
            .parse()
            .expect("ROLLBACK_WINDOW_DAYS must be a valid i64");

        let upload_url_ttl_secs: u64 = std::env::var("UPLOAD_URL_TTL_SECS")
            .unwrap_or_else(|_| DEFAULT_UPLOAD_URL_TTL_SECS.to_string())
            .parse()
            .expect("UPLOAD_URL_TTL_SECS must be a valid u64");

        let artifacts_bucket =
            std::env::var("ARTIFACTS_BUCKET").expect("ARTIFACTS_BUCKET must be set");

        let batch_mode = BatchMode::parse(
            &std::env::var("BATCH_MODE").unwrap_or_else(|_| "queue".into()),
        )
        .expect("BATCH_MODE must be 'inline' or 'queue'");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            jwt: JwtConfig::from_env(),
            imports_enabled,
            rollback_window_days,
            upload_url_ttl_secs,
            artifacts_bucket,
            batch_mode,
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            rollback_window_days: self.rollback_window_days,
            upload_url_ttl: Duration::from_secs(self.upload_url_ttl_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_mode_parses_case_insensitively() {
        assert_eq!(BatchMode::parse("Inline"), Some(BatchMode::Inline));
        assert_eq!(BatchMode::parse(" queue "), Some(BatchMode::Queue));
        assert_eq!(BatchMode::parse("cron"), None);
    }
}
