//! Beacon analytics pipeline daemon.
//!
//! Runs the full ingestion pipeline in one process:
//! - Durable in-process event queue with retry and dead-lettering
//! - Batch accumulation, enrichment, and daily stats aggregation
//! - Session tracking and periodic session-metric recalculation
//!
//! Event intake happens through [`worker::Pipeline::ingest`]; the HTTP
//! surface and raw-event retention cleanup live in external services.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::info;

use queue::{DurableQueue, QueueConfig};
use storage::{MemoryStore, Store};
use telemetry::{init_tracing_from_env, metrics};
use worker::{Pipeline, WorkerConfig, WorkerScheduler};

/// Application configuration.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default)]
    queue: QueueConfig,

    #[serde(default)]
    worker: WorkerConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting beacon pipeline v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    info!(
        queue_capacity = config.queue.capacity,
        max_retries = config.queue.max_retries,
        concurrency = config.worker.concurrency,
        batch_size = config.worker.batch_size,
        "Loaded configuration"
    );

    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let queue = DurableQueue::new(config.queue.clone());
    let pipeline = Pipeline::new(config.worker.clone(), queue, store);

    let scheduler = WorkerScheduler::new(pipeline.clone());
    let handles = scheduler.start();

    shutdown_signal().await;

    info!("Shutting down...");
    scheduler.shutdown(handles).await;

    let snapshot = metrics().snapshot();
    info!(
        events_received = snapshot.events_received,
        events_acked = snapshot.events_acked,
        events_dead_lettered = snapshot.events_dead_lettered,
        batches_flushed = snapshot.batches_flushed,
        "Shutdown complete"
    );
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables (BEACON_QUEUE__CAPACITY etc.)
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("BEACON")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
