//! Pre-aggregated daily statistics types.
//!
//! A *bucket* is the aggregation unit, keyed by `(site_id, date)`. Raw
//! events never update a bucket directly; the aggregation engine folds a
//! batch into one additive [`BucketDelta`] per bucket and applies it as a
//! single atomic upsert, so a batch of 50 events touching 3 buckets costs
//! 3 writes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::events::Event;
use crate::session::Session;

/// Aggregation bucket key: one stats document per site per UTC day.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BucketKey {
    pub site_id: String,
    pub date: NaiveDate,
}

impl BucketKey {
    pub fn new(site_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            site_id: site_id.into(),
            date,
        }
    }

    /// The bucket an event aggregates into.
    pub fn for_event(event: &Event) -> Self {
        Self::new(event.site_id.clone(), event.bucket_date())
    }
}

impl std::fmt::Display for BucketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.site_id, self.date)
    }
}

/// One pre-aggregated stats document per `(site_id, date)`.
///
/// Counter fields are written only by the aggregation engine (always as
/// additive deltas); the session-derived fields are written only by the
/// recalculation job (always as a full field-set).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyStats {
    pub site_id: String,
    pub date: NaiveDate,

    /// Total event count. Always equals the sum of `path_counts` values.
    pub total_views: u64,
    /// Distinct visitor ids seen this day. Never shrinks.
    pub unique_users: HashSet<String>,
    pub path_counts: HashMap<String, u64>,
    pub device_counts: HashMap<String, u64>,
    pub browser_counts: HashMap<String, u64>,
    pub referrer_counts: HashMap<String, u64>,

    /// Session-derived metrics, recomputed from session rows.
    pub sessions_count: u64,
    /// Mean session duration in seconds, rounded to nearest integer.
    pub avg_session_duration: i64,
    /// Mean pages per session, one decimal.
    pub avg_pages_per_session: f64,
    /// Percentage of single-page sessions, one decimal.
    pub bounce_rate: f64,

    pub updated_at: DateTime<Utc>,
}

impl DailyStats {
    /// An empty bucket document, the upsert-with-defaults base.
    pub fn empty(key: &BucketKey, now: DateTime<Utc>) -> Self {
        Self {
            site_id: key.site_id.clone(),
            date: key.date,
            total_views: 0,
            unique_users: HashSet::new(),
            path_counts: HashMap::new(),
            device_counts: HashMap::new(),
            browser_counts: HashMap::new(),
            referrer_counts: HashMap::new(),
            sessions_count: 0,
            avg_session_duration: 0,
            avg_pages_per_session: 0.0,
            bounce_rate: 0.0,
            updated_at: now,
        }
    }

    pub fn key(&self) -> BucketKey {
        BucketKey::new(self.site_id.clone(), self.date)
    }
}

/// Additive in-memory delta for one bucket.
///
/// Purely increments and set inserts, so applying the same delta twice is
/// well-defined (counts double, the visitor set does not).
#[derive(Debug, Clone, Default)]
pub struct BucketDelta {
    pub views: u64,
    pub visitors: HashSet<String>,
    pub path_counts: HashMap<String, u64>,
    pub device_counts: HashMap<String, u64>,
    pub browser_counts: HashMap<String, u64>,
    pub referrer_counts: HashMap<String, u64>,
}

fn bump(map: &mut HashMap<String, u64>, key: &str) {
    *map.entry(key.to_string()).or_insert(0) += 1;
}

impl BucketDelta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one event into the delta. An event missing an optional
    /// dimension contributes no entry to that dimension's map.
    pub fn record(&mut self, event: &Event) {
        self.views += 1;
        self.visitors.insert(event.visitor_id.clone());
        bump(&mut self.path_counts, &event.path);
        if let Some(device) = &event.device_type {
            bump(&mut self.device_counts, device);
        }
        if let Some(browser) = &event.browser {
            bump(&mut self.browser_counts, browser);
        }
        if let Some(referrer) = &event.referrer {
            bump(&mut self.referrer_counts, referrer);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.views == 0
    }
}

/// Groups a batch of events into one delta per bucket.
pub fn deltas_for_batch(events: &[Event]) -> HashMap<BucketKey, BucketDelta> {
    let mut deltas: HashMap<BucketKey, BucketDelta> = HashMap::new();
    for event in events {
        deltas
            .entry(BucketKey::for_event(event))
            .or_default()
            .record(event);
    }
    deltas
}

/// Session-derived metrics for one bucket, written as a full field-set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub sessions_count: u64,
    pub avg_session_duration: i64,
    pub avg_pages_per_session: f64,
    pub bounce_rate: f64,
}

impl SessionMetrics {
    /// All-zero metrics for a day with no sessions. Never NaN.
    pub fn zero() -> Self {
        Self {
            sessions_count: 0,
            avg_session_duration: 0,
            avg_pages_per_session: 0.0,
            bounce_rate: 0.0,
        }
    }

    /// Recomputes the full snapshot from the session rows of one day.
    ///
    /// Always a recomputation, never an incremental patch: rounding is
    /// applied once, to the final means.
    pub fn compute(sessions: &[Session]) -> Self {
        if sessions.is_empty() {
            return Self::zero();
        }

        let count = sessions.len() as f64;
        let total_duration: i64 = sessions
            .iter()
            .map(|s| (s.last_activity - s.started_at).num_seconds())
            .sum();
        let total_pages: u64 = sessions.iter().map(|s| s.page_count).sum();
        let bounces = sessions.iter().filter(|s| s.page_count == 1).count() as f64;

        Self {
            sessions_count: sessions.len() as u64,
            avg_session_duration: (total_duration as f64 / count).round() as i64,
            avg_pages_per_session: round1(total_pages as f64 / count),
            bounce_rate: round1(bounces / count * 100.0),
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
