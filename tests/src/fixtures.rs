//! Test fixtures and event generators.

use beacon_core::RawEvent;
use chrono::{DateTime, Utc};
use queue::{DurableQueue, QueueConfig};
use std::sync::Arc;
use storage::{MemoryStore, Store};
use worker::{Pipeline, WorkerConfig, WorkerScheduler};

/// A minimal valid pageview.
pub fn pageview(visitor: &str, path: &str) -> RawEvent {
    RawEvent {
        event_type: Some("pageview".into()),
        path: Some(path.into()),
        session_id: Some(format!("sess-{visitor}")),
        visitor_id: Some(visitor.into()),
        ..Default::default()
    }
}

/// A pageview pinned to an explicit timestamp.
pub fn pageview_at(visitor: &str, path: &str, ts: DateTime<Utc>) -> RawEvent {
    RawEvent {
        timestamp: Some(ts.to_rfc3339()),
        ..pageview(visitor, path)
    }
}

/// A pageview with a specific session id.
pub fn pageview_in_session(visitor: &str, path: &str, session_id: &str) -> RawEvent {
    RawEvent {
        session_id: Some(session_id.into()),
        ..pageview(visitor, path)
    }
}

/// A pageview carrying a user agent, for exercising enrichment.
pub fn pageview_with_ua(visitor: &str, path: &str, user_agent: &str) -> RawEvent {
    RawEvent {
        user_agent: Some(user_agent.into()),
        ..pageview(visitor, path)
    }
}

/// A fully assembled pipeline over a fresh in-memory store.
pub struct TestPipeline {
    pub pipeline: Arc<Pipeline>,
    pub store: Arc<MemoryStore>,
    pub scheduler: WorkerScheduler,
}

/// Builds a pipeline with the given worker and queue configs.
pub fn build_pipeline(worker: WorkerConfig, queue: QueueConfig) -> TestPipeline {
    let store = Arc::new(MemoryStore::new());
    let queue = DurableQueue::new(queue);
    let pipeline = Pipeline::new(worker, queue, store.clone() as Arc<dyn Store>);
    let scheduler = WorkerScheduler::new(pipeline.clone());
    TestPipeline {
        pipeline,
        store,
        scheduler,
    }
}

/// Builds a pipeline with default queue config.
pub fn build_default_pipeline(worker: WorkerConfig) -> TestPipeline {
    build_pipeline(worker, QueueConfig::default())
}
