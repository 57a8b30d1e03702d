//! Event types and input validation.
//!
//! This module handles:
//! - Parsing raw client events (snake_case, camelCase aliases for the v1 SDK)
//! - Validating required fields, collecting every violation at once
//! - Normalizing into the immutable [`Event`] persisted by the pipeline

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::{Error, Result, ValidationReport};
use crate::limits::{MAX_ID_LEN, MAX_PROPS_BYTES};

/// Validates serialized size of the open key-value maps.
fn validate_props_size(props: &HashMap<String, Value>) -> std::result::Result<(), ValidationError> {
    let size = serde_json::to_vec(props).map(|v| v.len()).unwrap_or(0);
    if size > MAX_PROPS_BYTES {
        let mut err = ValidationError::new("properties_too_large");
        err.message = Some(
            format!(
                "properties {}KB exceeds {}KB limit",
                size / 1024,
                MAX_PROPS_BYTES / 1024
            )
            .into(),
        );
        return Err(err);
    }
    Ok(())
}

/// Raw event as received from the ingestion API, before validation.
///
/// `site_id` is deliberately absent: the authenticated site id is
/// injected server-side and never trusted from the payload (a client
/// supplied `site_id` field is silently dropped by serde).
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct RawEvent {
    #[serde(default, alias = "type", alias = "eventType")]
    #[validate(length(max = 100))]
    pub event_type: Option<String>,

    #[serde(default)]
    #[validate(length(max = 2000))]
    pub path: Option<String>,

    #[serde(default, alias = "sessionId")]
    #[validate(length(max = 128))]
    pub session_id: Option<String>,

    /// Subject identifier. Protocol v2 sends `visitor_id`; v1 sent
    /// `user_id`, which is still accepted as an alias.
    #[serde(default, alias = "visitorId")]
    #[validate(length(max = 128))]
    pub visitor_id: Option<String>,

    #[serde(default, alias = "userId")]
    #[validate(length(max = 128))]
    pub user_id: Option<String>,

    /// RFC 3339 timestamp. Server "now" is assigned when absent.
    #[serde(default)]
    pub timestamp: Option<String>,

    #[serde(default, alias = "deviceType")]
    #[validate(length(max = 64))]
    pub device_type: Option<String>,

    #[serde(default)]
    #[validate(length(max = 64))]
    pub browser: Option<String>,

    #[serde(default)]
    #[validate(length(max = 64))]
    pub os: Option<String>,

    #[serde(default)]
    #[validate(length(max = 2048))]
    pub referrer: Option<String>,

    #[serde(default, alias = "userAgent")]
    #[validate(length(max = 512))]
    pub user_agent: Option<String>,

    #[serde(default, alias = "screenResolution")]
    #[validate(length(max = 32))]
    pub screen_resolution: Option<String>,

    #[serde(default, alias = "viewportSize")]
    #[validate(length(max = 32))]
    pub viewport_size: Option<String>,

    #[serde(default, alias = "userProps")]
    #[validate(custom(function = "validate_props_size"))]
    pub user_props: Option<HashMap<String, Value>>,

    #[serde(default)]
    #[validate(custom(function = "validate_props_size"))]
    pub metadata: Option<HashMap<String, Value>>,
}

/// A validated, normalized analytics event. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event ID, assigned at ingestion.
    pub id: Uuid,
    /// Authenticated site this event belongs to.
    pub site_id: String,
    pub session_id: String,
    pub visitor_id: String,
    pub event_type: String,
    pub path: String,
    /// Client timestamp, or server receive time when the client sent none.
    pub timestamp: DateTime<Utc>,
    /// Server receive timestamp.
    pub received_at: DateTime<Utc>,

    pub device_type: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub screen_resolution: Option<String>,
    pub viewport_size: Option<String>,
    pub user_props: Option<HashMap<String, Value>>,
    pub metadata: Option<HashMap<String, Value>>,
}

impl Event {
    /// UTC calendar date this event aggregates into.
    pub fn bucket_date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

fn required(report: &mut ValidationReport, field: &'static str, value: &Option<String>) -> Option<String> {
    match value.as_deref().map(str::trim) {
        None | Some("") => {
            report.push(field, "is required");
            None
        }
        Some(v) => Some(v.to_string()),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Validates and normalizes a raw event for the authenticated site.
///
/// Either returns a normalized [`Event`] or fails with a
/// [`ValidationReport`](crate::error::ValidationReport) enumerating every
/// violated field — length bounds, missing required fields, and a bad
/// timestamp are all reported together, not just the first. `now` becomes
/// both `received_at` and, when the payload carried no timestamp, the
/// event timestamp. No side effects.
pub fn validate_raw(raw: RawEvent, site_id: &str, now: DateTime<Utc>) -> Result<Event> {
    let mut report = ValidationReport::new();

    // Length and size bounds via the validator derive.
    if let Err(errors) = raw.validate() {
        for (field, violations) in errors.field_errors() {
            for v in violations {
                let reason = v
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("violates constraint `{}`", v.code));
                report.push(field, reason);
            }
        }
    }

    let event_type = required(&mut report, "event_type", &raw.event_type);
    let path = required(&mut report, "path", &raw.path);
    let session_id = required(&mut report, "session_id", &raw.session_id);

    // Subject id: visitor_id, falling back to the legacy user_id field.
    let visitor_id = match non_empty(raw.visitor_id).or(non_empty(raw.user_id)) {
        Some(v) if v.len() <= MAX_ID_LEN => Some(v.trim().to_string()),
        Some(_) => None, // length violation already recorded above
        None => {
            report.push("visitor_id", "a visitor_id or user_id is required");
            None
        }
    };

    let timestamp = match raw.timestamp.as_deref() {
        None | Some("") => Some(now),
        Some(ts) => match DateTime::parse_from_rfc3339(ts) {
            Ok(parsed) => Some(parsed.with_timezone(&Utc)),
            Err(e) => {
                report.push("timestamp", format!("not a valid RFC 3339 timestamp: {e}"));
                None
            }
        },
    };

    report.into_result()?;

    // All required fields are present once the report is empty.
    let (event_type, path, session_id, visitor_id, timestamp) =
        match (event_type, path, session_id, visitor_id, timestamp) {
            (Some(a), Some(b), Some(c), Some(d), Some(e)) => (a, b, c, d, e),
            _ => return Err(Error::internal("validation passed with missing fields")),
        };

    Ok(Event {
        id: Uuid::new_v4(),
        site_id: site_id.to_string(),
        session_id,
        visitor_id,
        event_type,
        path: normalize_path(&path),
        timestamp,
        received_at: now,
        device_type: non_empty(raw.device_type),
        browser: non_empty(raw.browser),
        os: non_empty(raw.os),
        referrer: non_empty(raw.referrer),
        user_agent: non_empty(raw.user_agent),
        screen_resolution: non_empty(raw.screen_resolution),
        viewport_size: non_empty(raw.viewport_size),
        user_props: raw.user_props.filter(|m| !m.is_empty()),
        metadata: raw.metadata.filter(|m| !m.is_empty()),
    })
}

/// Reduces a full URL to its path; plain paths pass through unchanged.
fn normalize_path(path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        url::Url::parse(path)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| "/".to_string())
    } else {
        path.to_string()
    }
}
