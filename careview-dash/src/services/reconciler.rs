//! Cross-source appointment reconciliation
//!
//! Pairs Bookings (source A) and Airtable (source B) records that describe the
//! same visit, using fuzzy client-name similarity plus a timestamp tolerance.
//! Matching is greedy in source-A order; see [`reconcile`].

use careview_common::config::{ClaimPolicy, ReconcileSettings, MAX_TOLERANCE_HOURS};
use careview_common::time::local_date;
use chrono::{DateTime, Duration, Utc};

use super::similarity::{client_key, key_similarity};
use crate::models::{DataQualityIssue, MergedRecord, Record, ReconciliationReport, ReconciliationSummary};

/// How close two timestamps must be to pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tolerance {
    /// Absolute difference at most this long (inclusive)
    Window(Duration),
    /// Both fall on the same calendar day at this UTC offset
    SameDay { utc_offset_minutes: i32 },
}

impl Tolerance {
    pub fn accepts(&self, a: &DateTime<Utc>, b: &DateTime<Utc>) -> bool {
        match *self {
            Tolerance::Window(window) => (*a - *b).abs() <= window,
            Tolerance::SameDay { utc_offset_minutes } => {
                local_date(a, utc_offset_minutes) == local_date(b, utc_offset_minutes)
            }
        }
    }
}

/// Parameters for one reconciliation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Minimum similarity score (inclusive)
    pub threshold: u8,
    pub tolerance: Tolerance,
    pub claim_policy: ClaimPolicy,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            threshold: 85,
            tolerance: Tolerance::Window(Duration::hours(24)),
            claim_policy: ClaimPolicy::Exclusive,
        }
    }
}

impl ReconcileConfig {
    /// Build from TOML settings and the display offset used for same-day mode
    ///
    /// Tolerance is clamped to `0..=MAX_TOLERANCE_HOURS`.
    pub fn from_settings(settings: &ReconcileSettings, utc_offset_minutes: i32) -> Self {
        let tolerance = if settings.same_day {
            Tolerance::SameDay { utc_offset_minutes }
        } else {
            Tolerance::Window(Duration::hours(settings.tolerance_hours.clamp(0, MAX_TOLERANCE_HOURS)))
        };

        Self {
            threshold: settings.threshold.min(100),
            tolerance,
            claim_policy: settings.claim_policy,
        }
    }
}

/// A record that passed validation, with its precomputed key
struct Candidate {
    record: Record,
    key: String,
    timestamp: DateTime<Utc>,
}

/// Reconcile two record lists into merged records
///
/// **Algorithm:**
/// 1. Records missing an identifier or timestamp go to the data-quality list
/// 2. For each remaining source-A record (input order), score every
///    available source-B record by token-sort similarity of client keys
/// 3. Keep candidates with score >= threshold inside the tolerance
/// 4. Pick the highest score; ties go to the earliest B timestamp, then the
///    earliest B input position
/// 5. Under `Exclusive`, a chosen B record leaves the pool; under `Shared`
///    it stays available and may appear in several merged records
/// 6. Emit A records in order (matched or not), then unmatched B records
///
/// Empty client keys never match. Output is deterministic for identical input.
pub fn reconcile(
    source_a: Vec<Record>,
    source_b: Vec<Record>,
    config: &ReconcileConfig,
) -> ReconciliationReport {
    let a_count = source_a.len();
    let b_count = source_b.len();
    let mut data_quality = Vec::new();

    let a_valid = validate(source_a, &mut data_quality);
    let b_valid = validate(source_b, &mut data_quality);

    let mut b_used = vec![false; b_valid.len()];
    let mut merged = Vec::with_capacity(a_valid.len() + b_valid.len());

    for a in a_valid {
        match best_candidate(&a, &b_valid, &b_used, config) {
            Some((j, score)) => {
                let b = &b_valid[j];
                tracing::debug!(
                    a_id = %a.record.id,
                    b_id = %b.record.id,
                    score,
                    "Matched records"
                );
                b_used[j] = true;
                merged.push(MergedRecord::matched(a.record, &b.record, score));
            }
            None => merged.push(MergedRecord::unmatched(a.record)),
        }
    }

    let unmatched_a = merged.iter().filter(|m| !m.is_matched()).count();
    let mut unmatched_b = 0;
    for (b, used) in b_valid.into_iter().zip(b_used) {
        if !used {
            unmatched_b += 1;
            merged.push(MergedRecord::unmatched(b.record));
        }
    }

    let matched: Vec<u8> = merged
        .iter()
        .filter(|m| m.is_matched())
        .map(|m| m.confidence)
        .collect();
    let mean_confidence = if matched.is_empty() {
        0.0
    } else {
        let total: f64 = matched.iter().map(|&c| f64::from(c)).sum();
        (total / matched.len() as f64 * 100.0).round() / 100.0
    };

    let summary = ReconciliationSummary {
        matched_pairs: matched.len(),
        unmatched_a,
        unmatched_b,
        data_quality_issues: data_quality.len(),
        mean_confidence,
    };

    tracing::info!(
        source_a = a_count,
        source_b = b_count,
        matched = summary.matched_pairs,
        unmatched_a = summary.unmatched_a,
        unmatched_b = summary.unmatched_b,
        data_quality = summary.data_quality_issues,
        "Reconciliation complete"
    );

    ReconciliationReport {
        merged,
        data_quality,
        summary,
    }
}

fn validate(records: Vec<Record>, issues: &mut Vec<DataQualityIssue>) -> Vec<Candidate> {
    let mut valid = Vec::with_capacity(records.len());

    for record in records {
        let missing_id = record.id.trim().is_empty();
        let reason = match (missing_id, record.timestamp) {
            (false, Some(timestamp)) => {
                let key = client_key(&record.client_name);
                valid.push(Candidate {
                    record,
                    key,
                    timestamp,
                });
                continue;
            }
            (true, Some(_)) => "missing identifier",
            (false, None) => "missing or unparseable timestamp",
            (true, None) => "missing identifier and timestamp",
        };

        tracing::debug!(source = %record.source, id = %record.id, reason, "Excluded from matching");
        issues.push(DataQualityIssue::new(record.source, Some(record.id), reason));
    }

    valid
}

fn best_candidate(
    a: &Candidate,
    pool: &[Candidate],
    used: &[bool],
    config: &ReconcileConfig,
) -> Option<(usize, u8)> {
    if a.key.is_empty() {
        return None;
    }

    let mut best: Option<(usize, u8)> = None;

    for (j, b) in pool.iter().enumerate() {
        if used[j] && config.claim_policy == ClaimPolicy::Exclusive {
            continue;
        }
        if b.key.is_empty() || !config.tolerance.accepts(&a.timestamp, &b.timestamp) {
            continue;
        }

        let score = key_similarity(&a.key, &b.key);
        if score < config.threshold {
            continue;
        }

        // Iteration is in input order, so equal score and timestamp keeps the earlier index
        let better = match best {
            None => true,
            Some((k, best_score)) => {
                score > best_score || (score == best_score && b.timestamp < pool[k].timestamp)
            }
        };
        if better {
            best = Some((j, score));
        }
    }

    best
}
