//! In-memory storage backend.
//!
//! The reference implementation of [`Store`]: each collection sits behind
//! one mutex, and every upsert happens entirely inside a single lock
//! acquisition, which is what makes it atomic to concurrent callers.

use crate::store::Store;
use async_trait::async_trait;
use beacon_core::{
    BucketDelta, BucketKey, DailyStats, Error, Event, Result, Session, SessionMetrics,
};
use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use telemetry::metrics;
use tracing::debug;

/// In-memory [`Store`] backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    events: Mutex<Vec<Event>>,
    daily_stats: Mutex<HashMap<BucketKey, DailyStats>>,
    sessions: Mutex<HashMap<String, Session>>,
    /// When set, the next N mutating calls fail with a storage error.
    fail_next: Mutex<u32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` mutating calls fail, for exercising the retry
    /// path in tests.
    pub fn fail_next(&self, n: u32) {
        *self.fail_next.lock() = n;
    }

    fn check_failure(&self) -> Result<()> {
        let mut fail = self.fail_next.lock();
        if *fail > 0 {
            *fail -= 1;
            return Err(Error::storage("injected failure"));
        }
        Ok(())
    }

    /// Number of stats buckets currently stored.
    pub fn bucket_count(&self) -> usize {
        self.daily_stats.lock().len()
    }

    /// Number of session rows currently stored.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_events(&self, events: &[Event]) -> Result<()> {
        self.check_failure()?;
        self.events.lock().extend_from_slice(events);
        Ok(())
    }

    async fn apply_bucket_delta(&self, key: &BucketKey, delta: &BucketDelta) -> Result<()> {
        self.check_failure()?;
        let now = Utc::now();

        let mut buckets = self.daily_stats.lock();
        let stats = buckets
            .entry(key.clone())
            .or_insert_with(|| DailyStats::empty(key, now));

        stats.total_views += delta.views;
        stats
            .unique_users
            .extend(delta.visitors.iter().cloned());
        for (path, n) in &delta.path_counts {
            *stats.path_counts.entry(path.clone()).or_insert(0) += n;
        }
        for (device, n) in &delta.device_counts {
            *stats.device_counts.entry(device.clone()).or_insert(0) += n;
        }
        for (browser, n) in &delta.browser_counts {
            *stats.browser_counts.entry(browser.clone()).or_insert(0) += n;
        }
        for (referrer, n) in &delta.referrer_counts {
            *stats.referrer_counts.entry(referrer.clone()).or_insert(0) += n;
        }
        stats.updated_at = now;

        metrics().buckets_upserted.inc();
        debug!(bucket = %key, views = delta.views, "Applied bucket delta");
        Ok(())
    }

    async fn touch_session(&self, event: &Event) -> Result<()> {
        self.check_failure()?;
        let mut sessions = self.sessions.lock();
        match sessions.get_mut(&event.session_id) {
            Some(session) => session.touch(event),
            None => {
                sessions.insert(event.session_id.clone(), Session::from_event(event));
            }
        }
        metrics().sessions_touched.inc();
        Ok(())
    }

    async fn set_session_metrics(&self, key: &BucketKey, m: &SessionMetrics) -> Result<()> {
        self.check_failure()?;
        let now = Utc::now();

        let mut buckets = self.daily_stats.lock();
        let stats = buckets
            .entry(key.clone())
            .or_insert_with(|| DailyStats::empty(key, now));
        stats.sessions_count = m.sessions_count;
        stats.avg_session_duration = m.avg_session_duration;
        stats.avg_pages_per_session = m.avg_pages_per_session;
        stats.bounce_rate = m.bounce_rate;
        stats.updated_at = now;
        Ok(())
    }

    async fn get_daily_stats(&self, site_id: &str, date: NaiveDate) -> Result<Option<DailyStats>> {
        let key = BucketKey::new(site_id, date);
        Ok(self.daily_stats.lock().get(&key).cloned())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.lock().get(session_id).cloned())
    }

    async fn sessions_started_on(&self, site_id: &str, date: NaiveDate) -> Result<Vec<Session>> {
        Ok(self
            .sessions
            .lock()
            .values()
            .filter(|s| s.site_id == site_id && s.started_at.date_naive() == date)
            .cloned()
            .collect())
    }

    async fn count_events(&self, site_id: &str) -> Result<u64> {
        Ok(self
            .events
            .lock()
            .iter()
            .filter(|e| e.site_id == site_id)
            .count() as u64)
    }
}
