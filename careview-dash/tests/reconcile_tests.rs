//! Integration tests for the reconciliation pipeline
//!
//! Covers:
//! - Reference examples (exact match, out-of-tolerance, initial vs full name)
//! - Every input accounted for (merged references or data quality)
//! - Exclusive vs shared claiming of source-B records
//! - Determinism and empty-name handling

use careview_common::config::ClaimPolicy;
use careview_common::time::parse_timestamp;
use careview_dash::models::{MatchStatus, Record, SourceTag};
use careview_dash::services::{reconcile, ReconcileConfig, Tolerance};
use chrono::Duration;

fn a(id: &str, name: &str, ts: &str) -> Record {
    Record::new(SourceTag::Bookings, id, name, parse_timestamp(ts))
}

fn b(id: &str, name: &str, ts: &str) -> Record {
    Record::new(SourceTag::Airtable, id, name, parse_timestamp(ts))
}

fn shared() -> ReconcileConfig {
    ReconcileConfig {
        claim_policy: ClaimPolicy::Shared,
        ..ReconcileConfig::default()
    }
}

// =============================================================================
// Reference examples
// =============================================================================

#[test]
fn test_same_client_within_a_day_merges() {
    let report = reconcile(
        vec![a("a1", "Jane Doe", "2024-01-05T10:00")],
        vec![b("b1", "Jane Doe", "2024-01-05T11:30")],
        &ReconcileConfig::default(),
    );

    assert_eq!(report.merged.len(), 1);
    let merged = &report.merged[0];
    assert_eq!(merged.confidence, 100);
    assert_eq!(merged.match_status, MatchStatus::Matched);
    assert_eq!(merged.contributors.len(), 2);
    assert_eq!(merged.contributors[0].source, SourceTag::Bookings);
    assert_eq!(merged.contributors[1].record_id, "b1");
}

#[test]
fn test_outside_tolerance_stays_unmatched() {
    let report = reconcile(
        vec![a("a1", "Jane Doe", "2024-01-05T10:00")],
        vec![b("b1", "Jane Doe", "2024-02-01")],
        &ReconcileConfig::default(),
    );

    assert_eq!(report.merged.len(), 2);
    assert!(report
        .merged
        .iter()
        .all(|m| m.confidence == 0 && m.match_status == MatchStatus::NoMatch));
    assert_eq!(report.merged[0].record.id, "a1");
    assert_eq!(report.merged[1].record.id, "b1");
}

#[test]
fn test_initial_does_not_reach_threshold() {
    let report = reconcile(
        vec![a("a1", "J. Doe", "2024-01-05T10:00")],
        vec![b("b1", "Jane Doe", "2024-01-05T10:00")],
        &ReconcileConfig::default(),
    );

    assert_eq!(report.summary.matched_pairs, 0);
    assert_eq!(report.summary.unmatched_a, 1);
    assert_eq!(report.summary.unmatched_b, 1);
}

// =============================================================================
// Accounting
// =============================================================================

#[test]
fn test_every_input_accounted_for() {
    let source_a = vec![
        a("a1", "Jane Doe", "2024-01-05T10:00"),
        a("a2", "Sam Lee", "2024-01-06T09:00"),
        a("", "No Id", "2024-01-06T09:00"),
        a("a4", "Ana Ruiz", "not a date"),
    ];
    let source_b = vec![
        b("b1", "jane doe", "2024-01-05T12:00"),
        b("b2", "Someone Else", "2024-01-06T09:00"),
        b("b3", "Lee, Sam", "2024-01-06T10:00"),
    ];
    let inputs = source_a.len() + source_b.len();

    let report = reconcile(source_a, source_b, &ReconcileConfig::default());

    assert_eq!(report.data_quality.len(), 2);
    assert_eq!(report.contributor_count(), inputs - report.data_quality.len());
    assert_eq!(report.summary.matched_pairs, 2);
    assert_eq!(report.summary.mean_confidence, 100.0);

    let ids: Vec<&str> = report.merged.iter().map(|m| m.record.id.as_str()).collect();
    assert_eq!(ids, vec!["a1", "a2", "b2"]);
}

#[test]
fn test_no_matches_is_not_an_error() {
    let report = reconcile(Vec::new(), Vec::new(), &ReconcileConfig::default());
    assert!(report.merged.is_empty());
    assert_eq!(report.summary.mean_confidence, 0.0);
}

// =============================================================================
// Claim policies
// =============================================================================

#[test]
fn test_exclusive_claim_never_double_counts() {
    let source_a = vec![
        a("a1", "Jane Doe", "2024-01-05T10:00"),
        a("a2", "Jane Doe", "2024-01-05T14:00"),
    ];
    let source_b = vec![b("b1", "Jane Doe", "2024-01-05T11:00")];

    let report = reconcile(source_a, source_b, &ReconcileConfig::default());

    assert_eq!(report.summary.matched_pairs, 1);
    assert_eq!(report.merged[0].contributors[1].record_id, "b1");
    assert_eq!(report.merged[1].match_status, MatchStatus::NoMatch);
    assert_eq!(report.contributor_count(), 3);
}

#[test]
fn test_exclusive_later_record_takes_next_best() {
    let source_a = vec![
        a("a1", "Jane Doe", "2024-01-05T10:00"),
        a("a2", "Jane Doe", "2024-01-05T14:00"),
    ];
    let source_b = vec![
        b("b1", "Jane Doe", "2024-01-05T11:00"),
        b("b2", "Jane Doe", "2024-01-05T15:00"),
    ];

    let report = reconcile(source_a, source_b, &ReconcileConfig::default());

    // a1 takes the earliest b1, a2 falls back to b2
    assert_eq!(report.merged[0].contributors[1].record_id, "b1");
    assert_eq!(report.merged[1].contributors[1].record_id, "b2");
    assert_eq!(report.merged.len(), 2);
}

#[test]
fn test_shared_claim_double_counts() {
    let source_a = vec![
        a("a1", "Jane Doe", "2024-01-05T10:00"),
        a("a2", "Jane Doe", "2024-01-05T14:00"),
    ];
    let source_b = vec![b("b1", "Jane Doe", "2024-01-05T11:00")];

    let report = reconcile(source_a, source_b, &shared());

    assert_eq!(report.summary.matched_pairs, 2);
    assert_eq!(report.summary.unmatched_b, 0);
    let b_refs = report
        .merged
        .iter()
        .flat_map(|m| &m.contributors)
        .filter(|r| r.record_id == "b1")
        .count();
    assert_eq!(b_refs, 2);
    // One more reference than there were inputs
    assert_eq!(report.contributor_count(), 4);
}

// =============================================================================
// Edge cases
// =============================================================================

#[test]
fn test_empty_names_never_pair() {
    let report = reconcile(
        vec![a("a1", "", "2024-01-05T10:00"), a("a2", "...", "2024-01-05T10:00")],
        vec![b("b1", "", "2024-01-05T10:00"), b("b2", "  ", "2024-01-05T10:00")],
        &shared(),
    );

    assert_eq!(report.summary.matched_pairs, 0);
    assert_eq!(report.merged.len(), 4);
}

#[test]
fn test_deterministic() {
    let make = || {
        (
            vec![
                a("a1", "Jane Doe", "2024-01-05T10:00"),
                a("a2", "Jon Smith", "2024-01-05T10:00"),
                a("a3", "Jane Doe", "2024-01-05T10:00"),
            ],
            vec![
                b("b1", "John Smith", "2024-01-05T10:00"),
                b("b2", "Jane Doe", "2024-01-05T10:00"),
                b("b3", "Jane Doe", "2024-01-05T10:00"),
            ],
        )
    };

    let (a1, b1) = make();
    let (a2, b2) = make();
    let config = ReconcileConfig::default();
    assert_eq!(reconcile(a1, b1, &config), reconcile(a2, b2, &config));
}

#[test]
fn test_same_day_mode() {
    let config = ReconcileConfig {
        tolerance: Tolerance::SameDay {
            utc_offset_minutes: -300,
        },
        ..ReconcileConfig::default()
    };

    // 09:00 and 23:30 Eastern on the same day: 14.5h apart but same date
    let report = reconcile(
        vec![a("a1", "Jane Doe", "2024-01-05T14:00:00Z")],
        vec![b("b1", "Jane Doe", "2024-01-06T04:30:00Z")],
        &config,
    );
    assert_eq!(report.summary.matched_pairs, 1);

    let narrow = ReconcileConfig {
        tolerance: Tolerance::Window(Duration::hours(2)),
        ..ReconcileConfig::default()
    };
    let report = reconcile(
        vec![a("a1", "Jane Doe", "2024-01-05T14:00:00Z")],
        vec![b("b1", "Jane Doe", "2024-01-06T04:30:00Z")],
        &narrow,
    );
    assert_eq!(report.summary.matched_pairs, 0);
}
