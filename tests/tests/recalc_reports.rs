//! Session-metric recalculation and range reporting.

use chrono::{TimeZone, Utc};
use integration_tests::fixtures::*;
use std::time::Duration;
use storage::{range_summary, Store};
use worker::WorkerConfig;

#[tokio::test]
async fn test_recalc_populates_session_metrics() {
    let t = build_default_pipeline(WorkerConfig {
        concurrency: 1,
        batch_size: 3,
        batch_idle_timeout_ms: 50,
        ..WorkerConfig::default()
    });
    let handles = t.scheduler.start();

    let start = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
    // Session a: two pages, 60 seconds. Session b: a bounce.
    t.pipeline
        .ingest(pageview_at("a", "/home", start), "s1")
        .unwrap();
    t.pipeline
        .ingest(
            pageview_at("a", "/docs", start + chrono::Duration::seconds(60)),
            "s1",
        )
        .unwrap();
    t.pipeline
        .ingest(pageview_at("b", "/home", start), "s1")
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    // The shutdown path runs one final recalculation over the dirty set.
    t.scheduler.shutdown(handles).await;

    let stats = t
        .store
        .get_daily_stats("s1", start.date_naive())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.total_views, 3);
    assert_eq!(stats.sessions_count, 2);
    assert_eq!(stats.avg_session_duration, 30);
    assert_eq!(stats.avg_pages_per_session, 1.5);
    assert_eq!(stats.bounce_rate, 50.0);
    assert!(t.pipeline.dirty().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_recalc_runs_on_interval_without_shutdown() {
    let t = build_default_pipeline(WorkerConfig {
        concurrency: 1,
        batch_size: 1,
        recalc_interval_secs: 30,
        ..WorkerConfig::default()
    });
    let handles = t.scheduler.start();

    let start = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
    t.pipeline
        .ingest(pageview_at("a", "/home", start), "s1")
        .unwrap();

    // Past one recalc interval, the bucket carries session metrics
    // while the pipeline is still running.
    tokio::time::sleep(Duration::from_secs(35)).await;
    let stats = t
        .store
        .get_daily_stats("s1", start.date_naive())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.sessions_count, 1);
    assert_eq!(stats.bounce_rate, 100.0);
    assert!(t.pipeline.dirty().is_empty());

    t.scheduler.shutdown(handles).await;
}

#[tokio::test]
async fn test_range_summary_spans_days() {
    let t = build_default_pipeline(WorkerConfig {
        concurrency: 1,
        batch_size: 1,
        ..WorkerConfig::default()
    });
    let handles = t.scheduler.start();

    let day1 = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
    let day2 = Utc.with_ymd_and_hms(2025, 3, 2, 10, 0, 0).unwrap();
    t.pipeline
        .ingest(pageview_at("a", "/home", day1), "s1")
        .unwrap();
    t.pipeline
        .ingest(pageview_at("b", "/home", day1), "s1")
        .unwrap();
    // Visitor a returns the next day; counted once over the range.
    t.pipeline
        .ingest(pageview_at("a", "/docs", day2), "s1")
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    t.scheduler.shutdown(handles).await;

    let summary = range_summary(
        t.store.as_ref(),
        "s1",
        day1.date_naive(),
        day2.date_naive(),
    )
    .await
    .unwrap();
    assert_eq!(summary.total_views, 3);
    assert_eq!(summary.unique_users, 2);
    assert_eq!(summary.path_counts["/home"], 2);
    assert_eq!(summary.path_counts["/docs"], 1);
    assert_eq!(summary.sessions_count, 2);
}

#[tokio::test]
async fn test_same_session_split_across_batches() {
    // Two batches touching one session still count every page: the
    // session upsert is atomic per event, not per batch.
    let t = build_default_pipeline(WorkerConfig {
        concurrency: 1,
        batch_size: 1,
        ..WorkerConfig::default()
    });
    let handles = t.scheduler.start();

    for i in 0..3 {
        t.pipeline
            .ingest(
                pageview_in_session("a", &format!("/p{i}"), "shared-session"),
                "s1",
            )
            .unwrap();
    }

    tokio::time::sleep(Duration::from_millis(300)).await;
    t.scheduler.shutdown(handles).await;

    let session = t.store.get_session("shared-session").await.unwrap().unwrap();
    assert_eq!(session.page_count, 3);
}
