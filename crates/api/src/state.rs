use std::sync::Arc;

use sheetport_pipeline::adapters::pg::{PgAccessGuard, PgAuditSink, PgImportStore};
use sheetport_pipeline::adapters::queue::QueueDispatcher;
use sheetport_pipeline::adapters::s3::S3Storage;
use sheetport_pipeline::ports::{AuditSink, BatchDispatcher, ImportStore, ObjectStorage};
use sheetport_pipeline::ImportContext;
use sheetport_worker::config::chunk_size_from_env;
use sheetport_worker::{BatchProcessor, InlineDispatcher};

use crate::config::{BatchMode, ServerConfig};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: the pool and context hold `Arc`s internally.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: sheetport_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Store, access guard, storage, audit sink and dispatcher for imports.
    pub imports: ImportContext,
}

/// Wire the production import adapters: Postgres, S3, and the dispatcher
/// selected by `BATCH_MODE`.
pub async fn build_import_context(pool: &sheetport_db::DbPool, config: &ServerConfig) -> ImportContext {
    let store: Arc<dyn ImportStore> = Arc::new(PgImportStore::new(pool.clone()));
    let storage: Arc<dyn ObjectStorage> =
        Arc::new(S3Storage::from_env(config.artifacts_bucket.clone()).await);
    let audit: Arc<dyn AuditSink> = Arc::new(PgAuditSink::new(pool.clone()));

    let dispatcher: Arc<dyn BatchDispatcher> = match config.batch_mode {
        BatchMode::Inline => {
            let processor = BatchProcessor::new(
                Arc::clone(&store),
                Arc::clone(&storage),
                Arc::clone(&audit),
                chunk_size_from_env(),
            );
            Arc::new(InlineDispatcher::new(Arc::new(processor)))
        }
        BatchMode::Queue => Arc::new(QueueDispatcher),
    };
    tracing::info!(batch_mode = ?config.batch_mode, "Import dispatcher configured");

    ImportContext {
        store,
        access: Arc::new(PgAccessGuard::new(pool.clone())),
        storage,
        audit,
        dispatcher,
        settings: config.pipeline_settings(),
    }
}
