//! Upstream record sources
//!
//! The dashboard talks to Bookings and Airtable through [`RecordSource`], so
//! handlers and tests can swap in fixed data.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::models::{DataQualityIssue, Record, SourceTag};

/// Upstream fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl FetchError {
    /// Whether another attempt might succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::NetworkError(_) | FetchError::RateLimitExceeded => true,
            FetchError::ApiError(status, _) => *status >= 500,
            _ => false,
        }
    }
}

/// Items gathered across pages, plus any warning that cut pagination short
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome<T> {
    pub items: Vec<T>,
    pub pages_fetched: usize,
    pub warnings: Vec<String>,
}

impl<T> Default for FetchOutcome<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            pages_fetched: 0,
            warnings: Vec::new(),
        }
    }
}

impl<T> FetchOutcome<T> {
    pub fn is_partial(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Date range and business filter for one dashboard query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchWindow {
    /// First local calendar day (inclusive)
    pub start: NaiveDate,
    /// Last local calendar day (inclusive)
    pub end: NaiveDate,
    pub business: Option<String>,
    pub utc_offset_minutes: i32,
}

/// Normalized records from one source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceBatch {
    pub source: SourceTag,
    pub records: Vec<Record>,
    /// Payloads that could not be turned into records at all
    pub rejected: Vec<DataQualityIssue>,
    pub pages_fetched: usize,
    pub warnings: Vec<String>,
}

impl SourceBatch {
    pub fn empty(source: SourceTag) -> Self {
        Self {
            source,
            records: Vec::new(),
            rejected: Vec::new(),
            pages_fetched: 0,
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// Per-source fetch summary returned to the UI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStatus {
    pub source: SourceTag,
    pub records: usize,
    pub pages_fetched: usize,
    pub partial: bool,
}

impl From<&SourceBatch> for SourceStatus {
    fn from(batch: &SourceBatch) -> Self {
        Self {
            source: batch.source,
            records: batch.records.len(),
            pages_fetched: batch.pages_fetched,
            partial: !batch.warnings.is_empty(),
        }
    }
}

/// A business unit (Bookings calendar)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BusinessUnit {
    pub id: String,
    pub name: String,
}

/// A paginated upstream that yields normalized records
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch and normalize records for a window
    ///
    /// Never fails: upstream problems become warnings on the batch.
    async fn fetch(&self, window: &FetchWindow) -> SourceBatch;

    /// Business units known to this source
    async fn business_units(&self) -> Result<Vec<BusinessUnit>, FetchError> {
        Ok(Vec::new())
    }
}
