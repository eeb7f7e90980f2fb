//! Airtable REST client
//!
//! Reads one table page by page using Airtable's `offset` cursor, retrying
//! transient failures per page with exponential backoff.

use async_trait::async_trait;
use careview_common::config::AirtableConfig;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

use super::normalizer;
use super::rate_limiter::RateLimiter;
use super::source::{FetchError, FetchOutcome, FetchWindow, RecordSource, SourceBatch};
use crate::models::{DataQualityIssue, SourceTag};

const USER_AGENT: &str = concat!("careview-dash/", env!("CARGO_PKG_VERSION"));
const RATE_LIMIT_MS: u64 = 200; // Airtable allows 5 requests/second per base

/// One Airtable row
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirtableRecord {
    pub id: String,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct AirtablePage {
    #[serde(default)]
    records: Vec<Value>,
    offset: Option<String>,
}

/// Airtable API client
pub struct AirtableClient {
    http_client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
    config: AirtableConfig,
    utc_offset_minutes: i32,
}

impl AirtableClient {
    pub fn new(config: &AirtableConfig, utc_offset_minutes: i32) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FetchError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(RATE_LIMIT_MS)),
            config: config.clone(),
            utc_offset_minutes,
        })
    }

    /// Table URL, or `NotConfigured` naming the first missing setting
    fn table_url(&self) -> Result<String, FetchError> {
        let missing = |what: &str| FetchError::NotConfigured(format!("Airtable {}", what));
        let base_id = self.config.base_id.as_deref().ok_or_else(|| missing("base id"))?;
        let table = self.config.table.as_deref().ok_or_else(|| missing("table"))?;
        if self.config.api_key.is_none() {
            return Err(missing("API key"));
        }

        let mut url = reqwest::Url::parse(&self.config.api_url)
            .map_err(|e| FetchError::NotConfigured(format!("Airtable API URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| missing("API URL path"))?
            .pop_if_empty()
            .extend([base_id, table]);
        Ok(url.to_string())
    }

    /// Fetch all rows of the configured table
    ///
    /// **Algorithm:**
    /// 1. Request a page (`pageSize`, plus `offset` after the first)
    /// 2. On a retryable failure, sleep `retry_base_ms * 2^attempt` and try
    ///    again, up to `retry_attempts` tries in total
    /// 3. Continue while the response carries an `offset`
    ///
    /// If the first page cannot be fetched the error is returned. A later page
    /// failing keeps the rows gathered so far and adds a warning.
    pub async fn fetch_records(&self) -> Result<FetchOutcome<Value>, FetchError> {
        let url = self.table_url()?;
        let mut outcome = FetchOutcome::default();
        let mut offset: Option<String> = None;

        loop {
            match self.get_page_with_retry(&url, offset.as_deref()).await {
                Ok(page) => {
                    outcome.pages_fetched += 1;
                    tracing::debug!(
                        page = outcome.pages_fetched,
                        records = page.records.len(),
                        "Fetched Airtable page"
                    );
                    outcome.items.extend(page.records);
                    match page.offset {
                        Some(next) if !next.is_empty() => offset = Some(next),
                        _ => break,
                    }
                }
                Err(e) if outcome.pages_fetched == 0 => return Err(e),
                Err(e) => {
                    tracing::warn!(error = %e, pages = outcome.pages_fetched, "Airtable page failed; returning partial data");
                    outcome.warnings.push(format!(
                        "Airtable pagination stopped after {} page(s): {}",
                        outcome.pages_fetched, e
                    ));
                    break;
                }
            }
        }

        Ok(outcome)
    }

    async fn get_page_with_retry(&self, url: &str, offset: Option<&str>) -> Result<AirtablePage, FetchError> {
        let attempts = self.config.retry_attempts.max(1);
        let mut attempt = 0;

        loop {
            match self.get_page(url, offset).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                    let backoff = self.config.retry_base_ms.saturating_mul(1u64 << attempt.min(16));
                    tracing::debug!(attempt = attempt + 1, backoff_ms = backoff, error = %e, "Retrying Airtable page");
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_page(&self, url: &str, offset: Option<&str>) -> Result<AirtablePage, FetchError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| FetchError::NotConfigured("Airtable API key".to_string()))?;

        self.rate_limiter.wait().await;

        let mut query = vec![("pageSize", self.config.page_size.to_string())];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }

        let response = self
            .http_client
            .get(url)
            .bearer_auth(api_key)
            .query(&query)
            .send()
            .await
            .map_err(|e| FetchError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status == 401 || status == 403 {
            return Err(FetchError::Unauthorized(format!("Airtable returned {}", status.as_u16())));
        }

        if status == 429 {
            return Err(FetchError::RateLimitExceeded);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(FetchError::ApiError(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| FetchError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl RecordSource for AirtableClient {
    async fn fetch(&self, window: &FetchWindow) -> SourceBatch {
        let batch = SourceBatch::empty(SourceTag::Airtable);

        let outcome = match self.fetch_records().await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, "Airtable fetch failed");
                return batch.with_warning(format!("Airtable unavailable: {}", e));
            }
        };

        let mut batch = SourceBatch {
            pages_fetched: outcome.pages_fetched,
            warnings: outcome.warnings,
            ..batch
        };

        for raw in outcome.items {
            let fallback_id = raw.get("id").and_then(Value::as_str).map(str::to_string);
            match serde_json::from_value::<AirtableRecord>(raw) {
                Ok(row) => {
                    let record = normalizer::from_airtable(&row, &self.config.fields, self.utc_offset_minutes);
                    if normalizer::in_window(&record, window) {
                        batch.records.push(record);
                    }
                }
                Err(e) => batch.rejected.push(DataQualityIssue::new(
                    SourceTag::Airtable,
                    fallback_id,
                    format!("malformed Airtable record: {}", e),
                )),
            }
        }

        tracing::info!(
            records = batch.records.len(),
            pages = batch.pages_fetched,
            warnings = batch.warnings.len(),
            "Airtable fetch complete"
        );
        batch
    }
}
