//! Session row types.
//!
//! A session is a bounded period of visitor activity, distinct from the
//! long-lived visitor identity. Session rows are the source of truth for
//! the derived duration/bounce metrics; they are written per event by the
//! session tracker and read (never mutated) by the recalculation job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::Event;

/// One row per `session_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub site_id: String,
    pub visitor_id: String,
    /// Set once, on the first event of the session.
    pub started_at: DateTime<Utc>,
    /// Overwritten on every event. Events are not guaranteed to arrive
    /// in timestamp order, so this may move backwards.
    pub last_activity: DateTime<Utc>,
    /// Number of events applied to this session. >= 1 once created.
    pub page_count: u64,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
}

impl Session {
    /// Creates the session row from its first event.
    pub fn from_event(event: &Event) -> Self {
        Self {
            session_id: event.session_id.clone(),
            site_id: event.site_id.clone(),
            visitor_id: event.visitor_id.clone(),
            started_at: event.timestamp,
            last_activity: event.timestamp,
            page_count: 1,
            referrer: event.referrer.clone(),
            user_agent: event.user_agent.clone(),
        }
    }

    /// Applies a subsequent event to the session row.
    pub fn touch(&mut self, event: &Event) {
        self.last_activity = event.timestamp;
        self.page_count += 1;
        if event.referrer.is_some() {
            self.referrer = event.referrer.clone();
        }
        if event.user_agent.is_some() {
            self.user_agent = event.user_agent.clone();
        }
    }

    /// Session duration so far, in seconds.
    pub fn duration_secs(&self) -> i64 {
        (self.last_activity - self.started_at).num_seconds()
    }

    /// A single-page session.
    pub fn is_bounce(&self) -> bool {
        self.page_count == 1
    }
}
