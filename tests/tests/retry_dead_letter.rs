//! Retry and dead-letter behavior under storage failures.
//!
//! These tests run on the paused tokio clock; the retry backoffs
//! (2/4/8/16/32s) elapse instantly via auto-advance.

use chrono::Utc;
use integration_tests::fixtures::*;
use std::time::Duration;
use storage::Store;
use worker::WorkerConfig;

fn retry_config() -> WorkerConfig {
    WorkerConfig {
        concurrency: 1,
        batch_size: 1,
        batch_idle_timeout_ms: 50,
        ..WorkerConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_retries_then_lands() {
    let t = build_default_pipeline(retry_config());
    let handles = t.scheduler.start();

    // First flush fails; the retried delivery succeeds.
    t.store.fail_next(1);
    t.pipeline.ingest(pageview("a", "/home"), "s1").unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;

    let date = Utc::now().date_naive();
    let stats = t.store.get_daily_stats("s1", date).await.unwrap().unwrap();
    assert_eq!(stats.total_views, 1);
    assert!(t.pipeline.queue().dead_letters().is_empty());
    assert_eq!(t.pipeline.queue().depth(), 0);

    t.scheduler.shutdown(handles).await;
}

#[tokio::test(start_paused = true)]
async fn test_retry_is_not_double_counted() {
    let t = build_default_pipeline(retry_config());
    let handles = t.scheduler.start();

    // The batch fails before any write lands, so the retry reapplies a
    // clean slate.
    t.store.fail_next(1);
    t.pipeline.ingest(pageview("a", "/home"), "s1").unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    t.scheduler.shutdown(handles).await;

    let date = Utc::now().date_naive();
    let stats = t.store.get_daily_stats("s1", date).await.unwrap().unwrap();
    assert_eq!(stats.total_views, 1);
    assert_eq!(stats.unique_users.len(), 1);
    let session = t.store.get_session("sess-a").await.unwrap().unwrap();
    assert_eq!(session.page_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_dead_letter_then_manual_requeue() {
    let t = build_default_pipeline(retry_config());
    let handles = t.scheduler.start();

    t.store.fail_next(u32::MAX);
    t.pipeline.ingest(pageview("a", "/home"), "s1").unwrap();

    // Initial delivery plus five retries over 2+4+8+16+32s.
    tokio::time::sleep(Duration::from_secs(90)).await;

    let dead = t.pipeline.queue().dead_letters().entries();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].attempts, 6);
    let date = Utc::now().date_naive();
    assert!(t.store.get_daily_stats("s1", date).await.unwrap().is_none());

    // Storage recovers; manual requeue replays the dead letter with a
    // fresh retry budget.
    t.store.fail_next(0);
    assert_eq!(t.pipeline.queue().requeue_dead_letters(), 1);
    tokio::time::sleep(Duration::from_secs(5)).await;

    let stats = t.store.get_daily_stats("s1", date).await.unwrap().unwrap();
    assert_eq!(stats.total_views, 1);
    assert!(t.pipeline.queue().dead_letters().is_empty());

    t.scheduler.shutdown(handles).await;
}

#[tokio::test(start_paused = true)]
async fn test_whole_batch_shares_one_fate() {
    let t = build_default_pipeline(WorkerConfig {
        concurrency: 1,
        batch_size: 2,
        batch_idle_timeout_ms: 50,
        ..WorkerConfig::default()
    });
    let handles = t.scheduler.start();

    t.store.fail_next(1);
    t.pipeline.ingest(pageview("a", "/home"), "s1").unwrap();
    t.pipeline.ingest(pageview("b", "/docs"), "s1").unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    t.scheduler.shutdown(handles).await;

    // Both events were nacked together and both landed on retry.
    let date = Utc::now().date_naive();
    let stats = t.store.get_daily_stats("s1", date).await.unwrap().unwrap();
    assert_eq!(stats.total_views, 2);
    assert_eq!(stats.unique_users.len(), 2);
}
