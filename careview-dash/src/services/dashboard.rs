//! Dashboard orchestration: fetch, normalize, reconcile, summarize
//!
//! Runs inside one request. Sources are queried one after the other; their
//! warnings travel with the response instead of failing it.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::analytics::{self, Analytics};
use super::reconciler::{reconcile, ReconcileConfig};
use super::source::{BusinessUnit, FetchWindow, RecordSource, SourceStatus};
use crate::models::{DataQualityIssue, MergedRecord, ReconciliationSummary};

/// Named date ranges offered by the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePreset {
    Last7Days,
    Last30Days,
    ThisMonth,
    LastMonth,
}

impl DatePreset {
    /// Inclusive (start, end) relative to `today`
    pub fn range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let month_start = today.with_day(1).unwrap_or(today);
        match self {
            DatePreset::Last7Days => (today - Duration::days(7), today),
            DatePreset::Last30Days => (today - Duration::days(30), today),
            DatePreset::ThisMonth => (month_start, today),
            DatePreset::LastMonth => {
                let prev_end = month_start - Duration::days(1);
                (prev_end.with_day(1).unwrap_or(prev_end), prev_end)
            }
        }
    }
}

/// Everything the dashboard view needs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardData {
    /// Correlates this response with its log lines
    pub request_id: Uuid,
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business: Option<String>,
    pub merged: Vec<MergedRecord>,
    pub data_quality: Vec<DataQualityIssue>,
    pub summary: ReconciliationSummary,
    pub analytics: Analytics,
    pub sources: Vec<SourceStatus>,
    pub warnings: Vec<String>,
}

/// Fetch both sources for `window` and reconcile them
///
/// Bookings is source A, Airtable source B. Payloads rejected during
/// normalization are listed ahead of the pipeline's own data-quality issues.
pub async fn build_dashboard(
    bookings: &dyn RecordSource,
    airtable: &dyn RecordSource,
    window: &FetchWindow,
    config: &ReconcileConfig,
) -> DashboardData {
    let request_id = Uuid::new_v4();
    tracing::info!(
        request_id = %request_id,
        start = %window.start,
        end = %window.end,
        business = ?window.business,
        "Building dashboard"
    );

    let a = bookings.fetch(window).await;
    let b = airtable.fetch(window).await;

    let sources = vec![SourceStatus::from(&a), SourceStatus::from(&b)];
    let mut warnings = a.warnings;
    warnings.extend(b.warnings);

    let mut data_quality = a.rejected;
    data_quality.extend(b.rejected);

    let report = reconcile(a.records, b.records, config);
    data_quality.extend(report.data_quality);

    let mut summary = report.summary;
    summary.data_quality_issues = data_quality.len();

    let analytics = analytics::compute(&report.merged, window.utc_offset_minutes);

    if !warnings.is_empty() {
        tracing::warn!(request_id = %request_id, count = warnings.len(), "Dashboard built from partial data");
    }

    DashboardData {
        request_id,
        start: window.start,
        end: window.end,
        business: window.business.clone(),
        merged: report.merged,
        data_quality,
        summary,
        analytics,
        sources,
        warnings,
    }
}

/// Cancellation snapshot key for a window
pub fn snapshot_key(window: &FetchWindow) -> String {
    format!(
        "{}..{}|{}",
        window.start,
        window.end,
        window.business.as_deref().unwrap_or("*")
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusinessGroup {
    pub prefix: String,
    pub businesses: Vec<BusinessUnit>,
}

/// Group businesses by the uppercase first two letters of their name
///
/// Groups come out sorted by prefix, members by name.
pub fn group_businesses(units: Vec<BusinessUnit>) -> Vec<BusinessGroup> {
    let mut groups: BTreeMap<String, Vec<BusinessUnit>> = BTreeMap::new();

    for unit in units {
        let prefix: String = unit.name.trim().chars().take(2).collect::<String>().to_uppercase();
        groups.entry(prefix).or_default().push(unit);
    }

    groups
        .into_iter()
        .map(|(prefix, mut businesses)| {
            businesses.sort_by(|a, b| a.name.cmp(&b.name));
            BusinessGroup { prefix, businesses }
        })
        .collect()
}
