//! Leader performance scoring over daily KPI reports
//!
//! Each Airtable row is one leader's end-of-day report for an event: counts
//! of Eargym promotions, crossbookings and posted photos/videos/testimonials,
//! plus two yes/no checklist items.

use careview_common::config::{KpiFieldMap, KpiWeights};
use careview_common::time::parse_timestamp;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::airtable_client::AirtableRecord;

/// Eargym promotions expected per event
pub const MINIMUM_EARGYM: f64 = 1.0;
/// Crossbookings expected per event
pub const MINIMUM_CROSSBOOKING: f64 = 2.0;
/// Photos/videos/testimonials expected per event
pub const MINIMUM_PHOTOS: f64 = 3.0;

/// Part of a count score earned by meeting its minimum; the rest scales with volume
const MINIMUM_SHARE: f64 = 0.7;
const UNKNOWN_SITE: &str = "Unknown Site";

/// One daily KPI report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiEntry {
    pub id: String,
    pub leader: String,
    pub site: String,
    pub date: Option<NaiveDate>,
    pub eargym_promotion: f64,
    pub crossbooking: f64,
    pub botd_eod_filled: bool,
    pub photos_videos_testimonials: f64,
    pub xrays_notes_uploaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_no_why: Option<String>,
}

impl KpiEntry {
    /// Read a report row through the configured column names
    ///
    /// Unreadable counts become 0 and anything other than "yes" is a no.
    pub fn from_airtable(rec: &AirtableRecord, fields: &KpiFieldMap) -> Self {
        let get = |name: &str| rec.fields.get(name);

        Self {
            id: rec.id.clone(),
            leader: get(fields.leader.as_str()).and_then(text).unwrap_or_default(),
            site: get(fields.site.as_str())
                .and_then(text)
                .unwrap_or_else(|| UNKNOWN_SITE.to_string()),
            date: get(fields.date.as_str()).and_then(text).and_then(|raw| parse_date(&raw)),
            eargym_promotion: get(fields.eargym_promotion.as_str()).map_or(0.0, count),
            crossbooking: get(fields.crossbooking.as_str()).map_or(0.0, count),
            botd_eod_filled: get(fields.botd_eod_filled.as_str()).is_some_and(yes),
            photos_videos_testimonials: get(fields.photos_videos_testimonials.as_str()).map_or(0.0, count),
            xrays_notes_uploaded: get(fields.xrays_notes_uploaded.as_str()).is_some_and(yes),
            if_no_why: get(fields.if_no_why.as_str()).and_then(text),
        }
    }

    fn meets_all_minimums(&self) -> bool {
        self.eargym_promotion >= MINIMUM_EARGYM
            && self.crossbooking >= MINIMUM_CROSSBOOKING
            && self.photos_videos_testimonials >= MINIMUM_PHOTOS
            && self.botd_eod_filled
            && self.xrays_notes_uploaded
    }
}

/// Which reports to score
///
/// Date bounds are inclusive; reports without a date are dropped once
/// either bound is set. Leader and site must match exactly.
#[derive(Debug, Clone, Default)]
pub struct KpiFilter {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub leader: Option<String>,
    pub site: Option<String>,
}

impl KpiFilter {
    pub fn accepts(&self, entry: &KpiEntry) -> bool {
        if self.start.is_some() || self.end.is_some() {
            let Some(date) = entry.date else {
                return false;
            };
            if self.start.is_some_and(|start| date < start) || self.end.is_some_and(|end| date > end) {
                return false;
            }
        }
        self.leader.as_deref().map_or(true, |l| entry.leader == l)
            && self.site.as_deref().map_or(true, |s| entry.site == s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderScore {
    pub leader: String,
    pub event_count: usize,
    pub avg_eargym_promotion: f64,
    pub avg_crossbooking: f64,
    pub avg_photos_videos_testimonials: f64,
    /// Share of reports with BOTD/EOD filled (0-1)
    pub botd_eod_rate: f64,
    /// Share of reports with X-rays and notes uploaded (0-1)
    pub xrays_notes_rate: f64,
    /// Mean partial credit against each minimum (0-1)
    pub eargym_min_met: f64,
    pub crossbooking_min_met: f64,
    pub photos_min_met: f64,
    /// Weighted score on 0..=100
    pub performance_score: f64,
    /// 1 is best; tied scores share the lower rank
    pub rank: usize,
    /// Percent of reports meeting every minimum
    pub minimums_met_pct: f64,
}

/// Score every leader appearing in `entries`
///
/// **Algorithm:**
/// 1. Per report, partial credit `min(count / minimum, 1)` for each counted KPI
/// 2. Per leader, average the raw counts, yes/no rates and partial credits
/// 3. Count KPIs become `0.7 * credit + 0.3 * avg / max`, where `max` is the
///    largest single report in `entries` (1 when nobody reported any)
/// 4. Weighted mean of the five KPIs with `weights` normalized to sum to 1, × 100
///
/// Leaders are returned best first, ties by name. Empty input, or weights
/// without a positive total, yield no scores.
pub fn score_leaders(entries: &[KpiEntry], weights: &KpiWeights) -> Vec<LeaderScore> {
    let Some(total_weight) = weights.total() else {
        return Vec::new();
    };
    if entries.is_empty() {
        return Vec::new();
    }

    let max_eargym = scale_max(entries, |e| e.eargym_promotion);
    let max_crossbooking = scale_max(entries, |e| e.crossbooking);
    let max_photos = scale_max(entries, |e| e.photos_videos_testimonials);

    let mut by_leader: BTreeMap<&str, Vec<&KpiEntry>> = BTreeMap::new();
    for entry in entries {
        by_leader.entry(entry.leader.as_str()).or_default().push(entry);
    }

    let mut scored: Vec<(f64, LeaderScore)> = by_leader
        .into_iter()
        .map(|(leader, reports)| {
            let mean = |f: &dyn Fn(&KpiEntry) -> f64| {
                reports.iter().map(|e| f(*e)).sum::<f64>() / reports.len() as f64
            };
            let flag = |b: bool| if b { 1.0 } else { 0.0 };

            let avg_eargym = mean(&|e| e.eargym_promotion);
            let avg_crossbooking = mean(&|e| e.crossbooking);
            let avg_photos = mean(&|e| e.photos_videos_testimonials);
            let botd_rate = mean(&|e| flag(e.botd_eod_filled));
            let xrays_rate = mean(&|e| flag(e.xrays_notes_uploaded));
            let eargym_min = mean(&|e| credit(e.eargym_promotion, MINIMUM_EARGYM));
            let crossbooking_min = mean(&|e| credit(e.crossbooking, MINIMUM_CROSSBOOKING));
            let photos_min = mean(&|e| credit(e.photos_videos_testimonials, MINIMUM_PHOTOS));
            let minimums_met = mean(&|e| flag(e.meets_all_minimums()));

            let weighted = (blend(eargym_min, avg_eargym, max_eargym) * weights.eargym_promotion
                + blend(crossbooking_min, avg_crossbooking, max_crossbooking) * weights.crossbooking
                + botd_rate * weights.botd_eod_filled
                + blend(photos_min, avg_photos, max_photos) * weights.photos_videos_testimonials
                + xrays_rate * weights.xrays_notes_uploaded)
                / total_weight;
            let score = weighted * 100.0;

            let row = LeaderScore {
                leader: leader.to_string(),
                event_count: reports.len(),
                avg_eargym_promotion: round2(avg_eargym),
                avg_crossbooking: round2(avg_crossbooking),
                avg_photos_videos_testimonials: round2(avg_photos),
                botd_eod_rate: round2(botd_rate),
                xrays_notes_rate: round2(xrays_rate),
                eargym_min_met: round2(eargym_min),
                crossbooking_min_met: round2(crossbooking_min),
                photos_min_met: round2(photos_min),
                performance_score: round2(score),
                rank: 0,
                minimums_met_pct: round2(minimums_met * 100.0),
            };
            (score, row)
        })
        .collect();

    let raw: Vec<f64> = scored.iter().map(|(score, _)| *score).collect();
    for (score, row) in scored.iter_mut() {
        row.rank = 1 + raw.iter().filter(|other| **other > *score).count();
    }

    let mut rows: Vec<LeaderScore> = scored.into_iter().map(|(_, row)| row).collect();
    rows.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.leader.cmp(&b.leader)));

    tracing::debug!(leaders = rows.len(), reports = entries.len(), "Scored KPI reports");
    rows
}

fn credit(count: f64, minimum: f64) -> f64 {
    (count / minimum).min(1.0)
}

fn blend(credit: f64, avg: f64, max: f64) -> f64 {
    credit * MINIMUM_SHARE + (avg / max) * (1.0 - MINIMUM_SHARE)
}

fn scale_max(entries: &[KpiEntry], f: impl Fn(&KpiEntry) -> f64) -> f64 {
    let max = entries.iter().map(f).fold(f64::NEG_INFINITY, f64::max);
    if max > 0.0 {
        max
    } else {
        1.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(raw).map(|ts| ts.date_naive()))
}

/// Strings, numbers, or the first entry of a lookup list
fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim()).filter(|s| !s.is_empty()).map(str::to_string),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.first().and_then(text),
        _ => None,
    }
}

fn count(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite()).unwrap_or(0.0)
}

fn yes(value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|s| s.trim().eq_ignore_ascii_case("yes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report(leader: &str, eargym: f64, cross: f64, botd: bool, photos: f64, xrays: bool) -> KpiEntry {
        KpiEntry {
            id: format!("rec-{}-{}", leader, eargym),
            leader: leader.to_string(),
            site: "North Clinic".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 5),
            eargym_promotion: eargym,
            crossbooking: cross,
            botd_eod_filled: botd,
            photos_videos_testimonials: photos,
            xrays_notes_uploaded: xrays,
            if_no_why: None,
        }
    }

    fn sample() -> Vec<KpiEntry> {
        vec![
            report("Ana", 1.0, 2.0, true, 3.0, true),
            report("Ana", 0.0, 1.0, false, 0.0, true),
            report("Ben", 2.0, 4.0, true, 6.0, true),
        ]
    }

    #[test]
    fn test_scores_and_ranks() {
        let scores = score_leaders(&sample(), &KpiWeights::default());
        assert_eq!(scores.len(), 2);

        let ben = &scores[0];
        assert_eq!((ben.leader.as_str(), ben.rank), ("Ben", 1));
        assert!((ben.performance_score - 100.0).abs() < 1e-9);
        assert_eq!(ben.minimums_met_pct, 100.0);

        // eargym 0.425, crossbooking 0.6375, botd 0.5, photos 0.425, xrays 1.0
        let ana = &scores[1];
        assert_eq!((ana.leader.as_str(), ana.rank, ana.event_count), ("Ana", 2, 2));
        assert!((ana.performance_score - 59.75).abs() < 0.011);
        assert_eq!(ana.crossbooking_min_met, 0.75);
        assert_eq!(ana.botd_eod_rate, 0.5);
        assert_eq!(ana.minimums_met_pct, 50.0);
    }

    #[test]
    fn test_weights_are_normalized() {
        let only_botd = KpiWeights {
            eargym_promotion: 0.0,
            crossbooking: 0.0,
            botd_eod_filled: 3.0,
            photos_videos_testimonials: 0.0,
            xrays_notes_uploaded: 0.0,
        };
        let scores = score_leaders(&sample(), &only_botd);
        assert_eq!(scores[0].performance_score, 100.0);
        assert_eq!(scores[1].performance_score, 50.0);
    }

    #[test]
    fn test_ties_share_rank() {
        let entries = vec![
            report("Cara", 1.0, 2.0, true, 3.0, true),
            report("Ana", 1.0, 2.0, true, 3.0, true),
            report("Ben", 0.0, 0.0, false, 0.0, false),
        ];
        let scores = score_leaders(&entries, &KpiWeights::default());
        let ranks: Vec<(&str, usize)> = scores.iter().map(|s| (s.leader.as_str(), s.rank)).collect();
        assert_eq!(ranks, vec![("Ana", 1), ("Cara", 1), ("Ben", 3)]);
        assert_eq!(scores[2].performance_score, 0.0);
    }

    #[test]
    fn test_all_zero_counts_do_not_divide_by_zero() {
        let entries = vec![report("Ana", 0.0, 0.0, true, 0.0, false)];
        let scores = score_leaders(&entries, &KpiWeights::default());
        assert_eq!(scores[0].performance_score, 20.0);
    }

    #[test]
    fn test_empty_input_and_bad_weights() {
        assert!(score_leaders(&[], &KpiWeights::default()).is_empty());

        let negative = KpiWeights {
            crossbooking: -2.0,
            ..KpiWeights::default()
        };
        assert!(score_leaders(&sample(), &negative).is_empty());
    }

    #[test]
    fn test_entry_from_airtable() {
        let rec: AirtableRecord = serde_json::from_value(json!({
            "id": "rec9",
            "fields": {
                "Select": "Ana",
                "Sites (from Tags)": [" North Clinic "],
                "Date": "2024-01-05",
                "# of Eargym Promotion": 2,
                "# of crossbooking": "3",
                "Are BOTD and EOD already filled?": "Yes",
                "Number of photos/Videos/Testimonials posted at the Teams channel": "n/a",
                "Are all Xray's and Dental Notes uploaded to the right platforms?": "No",
                "If No, Why?": "Scanner offline"
            }
        }))
        .unwrap();

        let entry = KpiEntry::from_airtable(&rec, &KpiFieldMap::default());
        assert_eq!(entry.leader, "Ana");
        assert_eq!(entry.site, "North Clinic");
        assert_eq!(entry.date, NaiveDate::from_ymd_opt(2024, 1, 5));
        assert_eq!(entry.eargym_promotion, 2.0);
        assert_eq!(entry.crossbooking, 3.0);
        assert_eq!(entry.photos_videos_testimonials, 0.0);
        assert!(entry.botd_eod_filled);
        assert!(!entry.xrays_notes_uploaded);
        assert_eq!(entry.if_no_why.as_deref(), Some("Scanner offline"));
    }

    #[test]
    fn test_entry_defaults() {
        let rec: AirtableRecord = serde_json::from_value(json!({"id": "rec0", "fields": {}})).unwrap();
        let entry = KpiEntry::from_airtable(&rec, &KpiFieldMap::default());
        assert_eq!(entry.site, UNKNOWN_SITE);
        assert!(entry.date.is_none());
        assert_eq!(entry.crossbooking, 0.0);
    }

    #[test]
    fn test_filter() {
        let mut entry = report("Ana", 1.0, 2.0, true, 3.0, true);
        let january = KpiFilter {
            start: NaiveDate::from_ymd_opt(2024, 1, 1),
            end: NaiveDate::from_ymd_opt(2024, 1, 31),
            ..KpiFilter::default()
        };
        assert!(january.accepts(&entry));

        let by_leader = KpiFilter {
            leader: Some("Ben".to_string()),
            ..KpiFilter::default()
        };
        assert!(!by_leader.accepts(&entry));

        entry.date = None;
        assert!(!january.accepts(&entry));
        assert!(KpiFilter::default().accepts(&entry));
    }
}
