//! Snapshot-diff cancellation detection
//!
//! Bookings drops cancelled appointments from its listing instead of marking
//! them. Keeping the previous listing per query lets us report appointments
//! that disappeared between two fetches.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use crate::models::{AppointmentStatus, Record};

/// Label for appointments inferred as cancelled by disappearance
pub const DATASET_COMPARISON: &str = "Dataset Comparison";
/// Label for appointments whose upstream status flipped to cancelled
pub const STATUS_CHANGE: &str = "Status Change";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedCancellation {
    pub record: Record,
    pub cancellation_source: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CancellationReport {
    /// True when this call only stored the first snapshot
    pub baseline: bool,
    pub previous_count: usize,
    pub current_count: usize,
    pub cancellations: Vec<DetectedCancellation>,
}

/// Stored listings kept when no capacity is given
pub const DEFAULT_MAX_SNAPSHOTS: usize = 64;

struct Snapshot {
    records: Vec<Record>,
    touched: u64,
}

#[derive(Default)]
struct Snapshots {
    by_key: HashMap<String, Snapshot>,
    clock: u64,
}

/// Previous appointment listings keyed by query
///
/// Holds at most `max_snapshots` keys; storing a new key beyond that evicts
/// the least recently observed one.
pub struct CancellationTracker {
    snapshots: RwLock<Snapshots>,
    max_snapshots: usize,
}

impl Default for CancellationTracker {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_SNAPSHOTS)
    }
}

impl CancellationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_snapshots: usize) -> Self {
        Self {
            snapshots: RwLock::new(Snapshots::default()),
            max_snapshots: max_snapshots.max(1),
        }
    }

    /// Compare `current` with the stored snapshot for `key`, then replace it
    ///
    /// **Algorithm:**
    /// 1. No snapshot yet: store `current`, report a baseline with no cancellations
    /// 2. Previous ids absent from `current` → `Dataset Comparison`
    /// 3. Ids present in both, cancelled now but not before → `Status Change`
    ///
    /// Output keeps the previous snapshot's order.
    pub async fn observe(&self, key: &str, current: Vec<Record>) -> CancellationReport {
        let mut guard = self.snapshots.write().await;
        let snapshots = &mut *guard;
        snapshots.clock += 1;
        let touched = snapshots.clock;
        let current_count = current.len();

        let report = match snapshots.by_key.get(key) {
            None => {
                tracing::info!(key = %key, appointments = current_count, "Stored cancellation baseline");
                CancellationReport {
                    baseline: true,
                    previous_count: 0,
                    current_count,
                    cancellations: Vec::new(),
                }
            }
            Some(previous) => {
                let cancellations = compare(&previous.records, &current);
                tracing::info!(
                    key = %key,
                    previous = previous.records.len(),
                    current = current_count,
                    cancellations = cancellations.len(),
                    "Compared appointment snapshots"
                );
                CancellationReport {
                    baseline: false,
                    previous_count: previous.records.len(),
                    current_count,
                    cancellations,
                }
            }
        };

        if !snapshots.by_key.contains_key(key) && snapshots.by_key.len() >= self.max_snapshots {
            let oldest = snapshots
                .by_key
                .iter()
                .min_by_key(|(_, snapshot)| snapshot.touched)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                snapshots.by_key.remove(&oldest);
                tracing::debug!(evicted = %oldest, "Dropped oldest cancellation snapshot");
            }
        }
        snapshots.by_key.insert(
            key.to_string(),
            Snapshot {
                records: current,
                touched,
            },
        );

        report
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.snapshots.read().await.by_key.len()
    }
}

fn compare(previous: &[Record], current: &[Record]) -> Vec<DetectedCancellation> {
    let current_by_id: HashMap<&str, &Record> = current.iter().map(|r| (r.id.as_str(), r)).collect();

    let mut seen = HashSet::new();
    let mut cancellations = Vec::new();
    for old in previous {
        if !seen.insert(old.id.as_str()) {
            continue;
        }
        match current_by_id.get(old.id.as_str()) {
            None => cancellations.push(DetectedCancellation {
                record: old.clone().with_status(AppointmentStatus::Cancelled),
                cancellation_source: DATASET_COMPARISON,
            }),
            Some(now) if now.status == AppointmentStatus::Cancelled
                && old.status != AppointmentStatus::Cancelled =>
            {
                cancellations.push(DetectedCancellation {
                    record: (*now).clone(),
                    cancellation_source: STATUS_CHANGE,
                })
            }
            Some(_) => {}
        }
    }
    cancellations
}
