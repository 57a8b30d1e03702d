//! End-to-end pipeline tests: ingest through the queue, batching,
//! aggregation, and into daily stats.

use beacon_core::{Error, RawEvent};
use chrono::Utc;
use integration_tests::fixtures::*;
use integration_tests::mocks::RecordingStore;
use queue::{DurableQueue, QueueConfig};
use std::sync::Arc;
use std::time::Duration;
use storage::Store;
use worker::{Pipeline, WorkerConfig, WorkerScheduler};

#[tokio::test]
async fn test_three_event_scenario() {
    let t = build_default_pipeline(WorkerConfig {
        concurrency: 2,
        batch_size: 3,
        batch_idle_timeout_ms: 50,
        ..WorkerConfig::default()
    });
    let handles = t.scheduler.start();

    t.pipeline.ingest(pageview("visitor-A", "/home"), "s1").unwrap();
    t.pipeline.ingest(pageview("visitor-B", "/home"), "s1").unwrap();
    t.pipeline.ingest(pageview("visitor-A", "/about"), "s1").unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    t.scheduler.shutdown(handles).await;

    let date = Utc::now().date_naive();
    let stats = t.store.get_daily_stats("s1", date).await.unwrap().unwrap();
    assert_eq!(stats.total_views, 3);
    assert_eq!(stats.unique_users.len(), 2);
    assert_eq!(stats.path_counts["/home"], 2);
    assert_eq!(stats.path_counts["/about"], 1);
    assert_eq!(t.pipeline.queue().depth(), 0);
}

#[tokio::test]
async fn test_batch_threshold_three_plus_three_plus_one() {
    // batch_size=3 and 7 events: two size-triggered flushes and one
    // idle flush. Flush count observed as insert round-trips.
    let store = RecordingStore::new();
    let queue = DurableQueue::new(QueueConfig::default());
    let config = WorkerConfig {
        concurrency: 1,
        batch_size: 3,
        batch_idle_timeout_ms: 100,
        ..WorkerConfig::default()
    };
    let pipeline = Pipeline::new(config, queue, Arc::new(store.clone()) as Arc<dyn Store>);
    let scheduler = WorkerScheduler::new(pipeline.clone());
    let handles = scheduler.start();

    for i in 0..7 {
        pipeline
            .ingest(pageview(&format!("v{i}"), "/page"), "s1")
            .unwrap();
    }

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(store.insert_calls(), 3);

    scheduler.shutdown(handles).await;
    let date = Utc::now().date_naive();
    let stats = store.get_daily_stats("s1", date).await.unwrap().unwrap();
    assert_eq!(stats.total_views, 7);
    assert_eq!(stats.unique_users.len(), 7);
}

#[tokio::test]
async fn test_one_upsert_per_bucket_per_batch() {
    let store = RecordingStore::new();
    let queue = DurableQueue::new(QueueConfig::default());
    let config = WorkerConfig {
        concurrency: 1,
        batch_size: 4,
        batch_idle_timeout_ms: 50,
        ..WorkerConfig::default()
    };
    let pipeline = Pipeline::new(config, queue, Arc::new(store.clone()) as Arc<dyn Store>);
    let scheduler = WorkerScheduler::new(pipeline.clone());
    let handles = scheduler.start();

    // Four events, two sites, one day: the size-triggered batch costs
    // exactly two bucket writes.
    pipeline.ingest(pageview("a", "/"), "s1").unwrap();
    pipeline.ingest(pageview("b", "/"), "s1").unwrap();
    pipeline.ingest(pageview("a", "/"), "s2").unwrap();
    pipeline.ingest(pageview("b", "/"), "s2").unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    scheduler.shutdown(handles).await;

    let upserts = store.bucket_upserts();
    assert_eq!(upserts.len(), 2);
    assert_eq!(store.session_touches(), 4);
}

#[tokio::test]
async fn test_enrichment_shows_up_in_dimension_counts() {
    let t = build_default_pipeline(WorkerConfig {
        concurrency: 1,
        batch_size: 1,
        ..WorkerConfig::default()
    });
    let handles = t.scheduler.start();

    t.pipeline
        .ingest(
            pageview_with_ua(
                "a",
                "/",
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            ),
            "s1",
        )
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    t.scheduler.shutdown(handles).await;

    let date = Utc::now().date_naive();
    let stats = t.store.get_daily_stats("s1", date).await.unwrap().unwrap();
    assert_eq!(stats.device_counts["desktop"], 1);
    assert_eq!(stats.browser_counts["Chrome"], 1);
}

#[tokio::test]
async fn test_invalid_event_rejected_synchronously() {
    let t = build_default_pipeline(WorkerConfig::default());

    let err = t.pipeline.ingest(RawEvent::default(), "s1").unwrap_err();
    match err {
        Error::Validation(report) => {
            // Every missing required field is reported, not just the first.
            assert!(report.violations.len() >= 4);
        }
        other => panic!("expected validation error, got {other}"),
    }
    assert_eq!(t.pipeline.queue().depth(), 0);
}

#[tokio::test]
async fn test_sites_are_isolated() {
    let t = build_default_pipeline(WorkerConfig {
        concurrency: 1,
        batch_size: 2,
        batch_idle_timeout_ms: 50,
        ..WorkerConfig::default()
    });
    let handles = t.scheduler.start();

    t.pipeline.ingest(pageview("a", "/"), "s1").unwrap();
    t.pipeline.ingest(pageview("a", "/"), "s2").unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    t.scheduler.shutdown(handles).await;

    let date = Utc::now().date_naive();
    let s1 = t.store.get_daily_stats("s1", date).await.unwrap().unwrap();
    let s2 = t.store.get_daily_stats("s2", date).await.unwrap().unwrap();
    assert_eq!(s1.total_views, 1);
    assert_eq!(s2.total_views, 1);
}

#[tokio::test]
async fn test_queue_full_backpressure_at_ingest() {
    let t = build_pipeline(
        WorkerConfig::default(),
        QueueConfig {
            capacity: 2,
            ..QueueConfig::default()
        },
    );

    // No consumers running; the queue fills.
    t.pipeline.ingest(pageview("a", "/"), "s1").unwrap();
    t.pipeline.ingest(pageview("b", "/"), "s1").unwrap();
    let err = t.pipeline.ingest(pageview("c", "/"), "s1").unwrap_err();
    assert!(matches!(err, Error::QueueFull));
}
