//! Data models shared by services and API handlers

pub mod contact;
pub mod merged;
pub mod record;

pub use contact::{
    Contact, ContactReport, ContactStats, DuplicateCounts, DuplicateGroup, DuplicateKind,
    FlaggedContact, OutlookContact,
};
pub use merged::{
    DataQualityIssue, MatchStatus, MergedRecord, ReconciliationReport, ReconciliationSummary,
    SourceRef,
};
pub use record::{AppointmentStatus, Record, SourceTag};
