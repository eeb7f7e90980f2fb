//! Reconciliation output types

use super::record::{Record, SourceTag};
use serde::{Deserialize, Serialize};

/// Pointer back to a contributing source record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct SourceRef {
    pub source: SourceTag,
    pub record_id: String,
}

impl SourceRef {
    pub fn of(record: &Record) -> Self {
        Self {
            source: record.source,
            record_id: record.id.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Matched,
    NoMatch,
}

/// A record after reconciliation
///
/// For matched pairs `record` is the source-A record and `contributors` holds
/// both references (A first). Unmatched records carry confidence 0 and one
/// reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRecord {
    pub record: Record,
    /// Similarity score of the match (0..=100), 0 when unmatched
    pub confidence: u8,
    pub match_status: MatchStatus,
    pub contributors: Vec<SourceRef>,
}

impl MergedRecord {
    pub fn unmatched(record: Record) -> Self {
        let contributors = vec![SourceRef::of(&record)];
        Self {
            record,
            confidence: 0,
            match_status: MatchStatus::NoMatch,
            contributors,
        }
    }

    pub fn matched(a: Record, b: &Record, confidence: u8) -> Self {
        let contributors = vec![SourceRef::of(&a), SourceRef::of(b)];
        Self {
            record: a,
            confidence,
            match_status: MatchStatus::Matched,
            contributors,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.match_status == MatchStatus::Matched
    }
}

/// A record kept out of matching because a required field is missing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataQualityIssue {
    pub source: SourceTag,
    /// Identifier if the source supplied one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    pub reason: String,
}

impl DataQualityIssue {
    pub fn new(source: SourceTag, record_id: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            source,
            record_id: record_id.filter(|id| !id.is_empty()),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconciliationSummary {
    pub matched_pairs: usize,
    pub unmatched_a: usize,
    pub unmatched_b: usize,
    pub data_quality_issues: usize,
    /// Mean confidence over matched pairs, 0 when none matched
    pub mean_confidence: f64,
}

/// Full pipeline result
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconciliationReport {
    pub merged: Vec<MergedRecord>,
    pub data_quality: Vec<DataQualityIssue>,
    pub summary: ReconciliationSummary,
}

impl ReconciliationReport {
    /// Total number of source references across merged records
    pub fn contributor_count(&self) -> usize {
        self.merged.iter().map(|m| m.contributors.len()).sum()
    }
}
