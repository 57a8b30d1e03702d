//! The storage trait.

use async_trait::async_trait;
use beacon_core::{BucketDelta, BucketKey, DailyStats, Event, Result, Session, SessionMetrics};
use chrono::NaiveDate;

/// Storage backend for events, daily stats buckets, and session rows.
///
/// Contract for implementors: every mutating method is a single atomic
/// per-document upsert. A concurrent reader observes either the document
/// before the call or after it, never a half-applied state, and two
/// racing upserts against the same document both land (no lost updates).
#[async_trait]
pub trait Store: Send + Sync {
    /// Appends raw events. Events are immutable once written.
    async fn insert_events(&self, events: &[Event]) -> Result<()>;

    /// Atomic upsert of one additive delta into one stats bucket:
    /// create-if-absent with defaults, increment every counter, union the
    /// visitor set, and refresh `updated_at`, all as one operation.
    async fn apply_bucket_delta(&self, key: &BucketKey, delta: &BucketDelta) -> Result<()>;

    /// Atomic session upsert for one event: create the row on first
    /// touch, otherwise overwrite `last_activity`, increment
    /// `page_count`, and record the latest referrer/user agent.
    async fn touch_session(&self, event: &Event) -> Result<()>;

    /// Plain field-set of the session-derived metrics on one bucket.
    /// The one place an aggregate is overwritten rather than incremented;
    /// safe because the value is always a full snapshot, never a running
    /// total. Creates the bucket when absent.
    async fn set_session_metrics(&self, key: &BucketKey, metrics: &SessionMetrics) -> Result<()>;

    /// Reads one stats bucket. Absence is an empty result, not an error.
    async fn get_daily_stats(&self, site_id: &str, date: NaiveDate) -> Result<Option<DailyStats>>;

    /// Reads one session row.
    async fn get_session(&self, session_id: &str) -> Result<Option<Session>>;

    /// All sessions of a site whose `started_at` falls on the given UTC
    /// calendar date.
    async fn sessions_started_on(&self, site_id: &str, date: NaiveDate) -> Result<Vec<Session>>;

    /// Number of stored raw events for a site.
    async fn count_events(&self, site_id: &str) -> Result<u64>;
}
