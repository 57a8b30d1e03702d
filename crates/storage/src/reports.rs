//! Range reports over pre-aggregated daily buckets.
//!
//! Reads only the stats documents, never the raw events. A missing day
//! simply contributes nothing to the summary.

use crate::store::Store;
use beacon_core::Result;
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Aggregated stats over an inclusive date range for one site.
#[derive(Debug, Clone, Serialize)]
pub struct RangeSummary {
    pub site_id: String,
    pub from: NaiveDate,
    pub to: NaiveDate,

    pub total_views: u64,
    /// Distinct visitors over the whole range, not the sum of daily
    /// uniques (a visitor active on two days counts once).
    pub unique_users: u64,
    pub path_counts: HashMap<String, u64>,
    pub device_counts: HashMap<String, u64>,
    pub browser_counts: HashMap<String, u64>,
    pub referrer_counts: HashMap<String, u64>,

    pub sessions_count: u64,
    /// Session means weighted by each day's session count.
    pub avg_session_duration: i64,
    pub avg_pages_per_session: f64,
    pub bounce_rate: f64,
}

impl RangeSummary {
    fn empty(site_id: &str, from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            site_id: site_id.to_string(),
            from,
            to,
            total_views: 0,
            unique_users: 0,
            path_counts: HashMap::new(),
            device_counts: HashMap::new(),
            browser_counts: HashMap::new(),
            referrer_counts: HashMap::new(),
            sessions_count: 0,
            avg_session_duration: 0,
            avg_pages_per_session: 0.0,
            bounce_rate: 0.0,
        }
    }
}

fn merge_counts(into: &mut HashMap<String, u64>, from: &HashMap<String, u64>) {
    for (key, n) in from {
        *into.entry(key.clone()).or_insert(0) += n;
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Sums the daily buckets of `site_id` over `[from, to]` inclusive.
///
/// Days without a bucket contribute zeros; an entirely empty range is a
/// zero-valued summary, never an error.
pub async fn range_summary(
    store: &dyn Store,
    site_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<RangeSummary> {
    let mut summary = RangeSummary::empty(site_id, from, to);
    let mut visitors: HashSet<String> = HashSet::new();

    // Weighted accumulators for the session means.
    let mut duration_weighted = 0.0_f64;
    let mut pages_weighted = 0.0_f64;
    let mut bounce_weighted = 0.0_f64;

    let mut date = from;
    while date <= to {
        if let Some(stats) = store.get_daily_stats(site_id, date).await? {
            summary.total_views += stats.total_views;
            visitors.extend(stats.unique_users.iter().cloned());
            merge_counts(&mut summary.path_counts, &stats.path_counts);
            merge_counts(&mut summary.device_counts, &stats.device_counts);
            merge_counts(&mut summary.browser_counts, &stats.browser_counts);
            merge_counts(&mut summary.referrer_counts, &stats.referrer_counts);

            let weight = stats.sessions_count as f64;
            summary.sessions_count += stats.sessions_count;
            duration_weighted += stats.avg_session_duration as f64 * weight;
            pages_weighted += stats.avg_pages_per_session * weight;
            bounce_weighted += stats.bounce_rate * weight;
        }
        date += Duration::days(1);
    }

    summary.unique_users = visitors.len() as u64;
    if summary.sessions_count > 0 {
        let total = summary.sessions_count as f64;
        summary.avg_session_duration = (duration_weighted / total).round() as i64;
        summary.avg_pages_per_session = round1(pages_weighted / total);
        summary.bounce_rate = round1(bounce_weighted / total);
    }

    Ok(summary)
}
