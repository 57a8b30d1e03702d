//! Background task scheduler.
//!
//! Spawns the consumer pool and the periodic tickers (idle flush,
//! recalculation, dead-letter sweep, metrics snapshot) and owns the
//! graceful shutdown sequence.

use std::sync::Arc;
use std::time::Duration;
use telemetry::metrics;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{info, warn};

use crate::pipeline::Pipeline;

/// Bound on waiting for consumers to drain the closed queue. Parked
/// retries can hold the drain open for the full backoff schedule.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

pub struct WorkerScheduler {
    pipeline: Arc<Pipeline>,
    shutdown_tx: watch::Sender<bool>,
}

impl WorkerScheduler {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            pipeline,
            shutdown_tx,
        }
    }

    /// Starts all background tasks and returns their handles.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        let config = self.pipeline.config().clone();
        let mut handles = Vec::new();

        for i in 0..config.concurrency {
            let pipeline = self.pipeline.clone();
            handles.push(tokio::spawn(async move {
                pipeline.consume().await;
                info!(consumer = i, "Consumer task finished");
            }));
        }

        // Idle flush ticker. Polls a few times per idle window so a
        // partial batch never waits much past its timeout.
        let poll = Duration::from_millis((config.batch_idle_timeout_ms / 4).max(10));
        let pipeline = self.pipeline.clone();
        let mut shutdown = self.shutdown_tx.subscribe();
        handles.push(tokio::spawn(async move {
            let mut ticker = interval(poll);
            loop {
                tokio::select! {
                    _ = ticker.tick() => pipeline.flush_aged().await,
                    _ = shutdown.changed() => break,
                }
            }
        }));

        // Recalculation ticker.
        let pipeline = self.pipeline.clone();
        let mut shutdown = self.shutdown_tx.subscribe();
        let recalc_interval = config.recalc_interval();
        handles.push(tokio::spawn(async move {
            let mut ticker = interval(recalc_interval);
            ticker.tick().await; // the first tick fires immediately
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        pipeline.recalc().run_once().await;
                    }
                    _ = shutdown.changed() => break,
                }
            }
        }));

        // Dead-letter sweep ticker.
        let pipeline = self.pipeline.clone();
        let mut shutdown = self.shutdown_tx.subscribe();
        let sweep_interval =
            Duration::from_secs(self.pipeline.queue().config().dead_letter_sweep_secs);
        handles.push(tokio::spawn(async move {
            let mut ticker = interval(sweep_interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let swept = pipeline.queue().sweep_dead_letters();
                        if swept > 0 {
                            info!(swept = swept, "Swept expired dead letters");
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
        }));

        // Metrics snapshot logger.
        let mut shutdown = self.shutdown_tx.subscribe();
        let log_interval = config.metrics_log_interval();
        handles.push(tokio::spawn(async move {
            let mut ticker = interval(log_interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let snapshot = metrics().snapshot();
                        info!(
                            events_received = snapshot.events_received,
                            events_acked = snapshot.events_acked,
                            events_dead_lettered = snapshot.events_dead_lettered,
                            batches_flushed = snapshot.batches_flushed,
                            queue_depth = snapshot.queue_depth,
                            dirty_keys = snapshot.dirty_keys,
                            flush_latency_mean_ms = snapshot.flush_latency_mean_ms,
                            "Pipeline metrics"
                        );
                    }
                    _ = shutdown.changed() => break,
                }
            }
        }));

        info!(consumers = config.concurrency, "Background workers started");
        handles
    }

    /// Graceful shutdown: stop intake, let consumers drain the queue,
    /// flush the remaining buffer, run one final recalculation.
    pub async fn shutdown(&self, handles: Vec<JoinHandle<()>>) {
        info!("Shutting down worker scheduler");
        let _ = self.shutdown_tx.send(true);
        self.pipeline.queue().close();

        let drain = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
            warn!("Queue drain timed out, abandoning in-flight retries");
        }

        self.pipeline.drain().await;
        self.pipeline.recalc().run_once().await;
        info!("Worker scheduler stopped");
    }
}
