use std::sync::Arc;

use sheetport_pipeline::adapters::pg::{PgAuditSink, PgImportStore};
use sheetport_pipeline::adapters::s3::S3Storage;
use sheetport_worker::{poller, BatchProcessor, WorkerConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sheetport_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();

    let pool = sheetport_db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    sheetport_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    let storage = S3Storage::from_env(config.artifacts_bucket.clone()).await;
    let processor = Arc::new(BatchProcessor::new(
        Arc::new(PgImportStore::new(pool.clone())),
        Arc::new(storage),
        Arc::new(PgAuditSink::new(pool.clone())),
        config.chunk_size,
    ));

    let cancel = CancellationToken::new();
    let poller_handle = tokio::spawn(poller::run(
        processor,
        config.poll_interval,
        cancel.clone(),
    ));
    tracing::info!(chunk_size = config.chunk_size, "Worker started");

    shutdown_signal().await;
    cancel.cancel();
    let _ = poller_handle.await;

    pool.close().await;
    tracing::info!("Graceful shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
