//! Test doubles for the storage layer.

use async_trait::async_trait;
use beacon_core::{BucketDelta, BucketKey, DailyStats, Event, Result, Session, SessionMetrics};
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::sync::Arc;
use storage::{MemoryStore, Store};

/// Store wrapper that records write-path call counts.
///
/// Implements the same `Store` trait as the real backends, so tests can
/// assert the exact number of storage round-trips a flush performs
/// without inspecting the backend.
#[derive(Clone)]
pub struct RecordingStore {
    inner: Arc<MemoryStore>,
    insert_calls: Arc<Mutex<usize>>,
    bucket_upserts: Arc<Mutex<Vec<BucketKey>>>,
    session_touches: Arc<Mutex<usize>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryStore::new()),
            insert_calls: Arc::new(Mutex::new(0)),
            bucket_upserts: Arc::new(Mutex::new(Vec::new())),
            session_touches: Arc::new(Mutex::new(0)),
        }
    }

    pub fn inner(&self) -> &Arc<MemoryStore> {
        &self.inner
    }

    pub fn insert_calls(&self) -> usize {
        *self.insert_calls.lock()
    }

    /// Every bucket key upserted, in call order.
    pub fn bucket_upserts(&self) -> Vec<BucketKey> {
        self.bucket_upserts.lock().clone()
    }

    pub fn session_touches(&self) -> usize {
        *self.session_touches.lock()
    }
}

impl Default for RecordingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for RecordingStore {
    async fn insert_events(&self, events: &[Event]) -> Result<()> {
        *self.insert_calls.lock() += 1;
        self.inner.insert_events(events).await
    }

    async fn apply_bucket_delta(&self, key: &BucketKey, delta: &BucketDelta) -> Result<()> {
        self.bucket_upserts.lock().push(key.clone());
        self.inner.apply_bucket_delta(key, delta).await
    }

    async fn touch_session(&self, event: &Event) -> Result<()> {
        *self.session_touches.lock() += 1;
        self.inner.touch_session(event).await
    }

    async fn set_session_metrics(&self, key: &BucketKey, metrics: &SessionMetrics) -> Result<()> {
        self.inner.set_session_metrics(key, metrics).await
    }

    async fn get_daily_stats(&self, site_id: &str, date: NaiveDate) -> Result<Option<DailyStats>> {
        self.inner.get_daily_stats(site_id, date).await
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        self.inner.get_session(session_id).await
    }

    async fn sessions_started_on(&self, site_id: &str, date: NaiveDate) -> Result<Vec<Session>> {
        self.inner.sessions_started_on(site_id, date).await
    }

    async fn count_events(&self, site_id: &str) -> Result<u64> {
        self.inner.count_events(site_id).await
    }
}
