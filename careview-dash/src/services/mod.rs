//! Business logic services

pub mod airtable_client;
pub mod analytics;
pub mod cancellation_tracker;
pub mod contact_dedup;
pub mod dashboard;
pub mod graph_client;
pub mod kpi;
pub mod normalizer;
pub mod phone_formatter;
pub mod rate_limiter;
pub mod reconciler;
pub mod similarity;
pub mod source;

pub use airtable_client::AirtableClient;
pub use cancellation_tracker::CancellationTracker;
pub use graph_client::GraphClient;
pub use reconciler::{reconcile, ReconcileConfig, Tolerance};
pub use source::{FetchError, FetchWindow, RecordSource, SourceBatch};
