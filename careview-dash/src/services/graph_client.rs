//! Microsoft Graph Bookings client
//!
//! Lists booking businesses and pages through their appointments by
//! following `@odata.nextLink`. Authentication is a bearer token supplied by
//! configuration; acquiring it is someone else's job.

use async_trait::async_trait;
use careview_common::config::GraphConfig;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

use super::normalizer;
use super::source::{BusinessUnit, FetchError, FetchOutcome, FetchWindow, RecordSource, SourceBatch};
use crate::models::SourceTag;

const USER_AGENT: &str = concat!("careview-dash/", env!("CARGO_PKG_VERSION"));

/// Graph collection page
#[derive(Debug, Deserialize)]
struct GraphPage<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

/// Booking business as listed by Graph
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingBusiness {
    pub id: String,
    pub display_name: String,
}

/// Graph `dateTimeTimeZone`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDateTime {
    pub date_time: String,
    #[serde(default)]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingCustomer {
    #[serde(default)]
    pub phone: Option<String>,
}

/// Bookings appointment, only the fields the dashboard reads
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingAppointment {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_email_address: Option<String>,
    #[serde(default)]
    pub customers: Vec<BookingCustomer>,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub start_date_time: Option<GraphDateTime>,
    #[serde(default)]
    pub end_date_time: Option<GraphDateTime>,
    #[serde(default)]
    pub customer_notes: Option<String>,
    #[serde(default)]
    pub cancelled_date_time: Option<String>,
    #[serde(default)]
    pub completed_date_time: Option<String>,
    #[serde(default, alias = "noShow")]
    pub is_no_show: Option<bool>,
}

/// Graph Bookings API client
pub struct GraphClient {
    http_client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
    page_size: u32,
}

impl GraphClient {
    pub fn new(config: &GraphConfig) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FetchError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            page_size: config.page_size,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.access_token.is_some()
    }

    /// List all booking businesses
    pub async fn list_businesses(&self) -> Result<Vec<BookingBusiness>, FetchError> {
        let url = self.endpoint(&["solutions", "bookingBusinesses"])?;
        let outcome = self.fetch_all::<BookingBusiness>(url).await?;

        // A truncated business list would silently hide whole calendars
        if let Some(warning) = outcome.warnings.into_iter().next() {
            return Err(FetchError::NetworkError(warning));
        }
        Ok(outcome.items)
    }

    /// Fetch every appointment page for one business
    ///
    /// Items are kept as raw JSON so one malformed appointment does not sink
    /// the page; the normalizer reports those individually.
    pub async fn fetch_appointments(
        &self,
        business_id: &str,
    ) -> Result<FetchOutcome<serde_json::Value>, FetchError> {
        let mut url = self.endpoint(&["solutions", "bookingBusinesses", business_id, "appointments"])?;
        url.query_pairs_mut()
            .append_pair("$top", &self.page_size.to_string());

        self.fetch_all(url).await
    }

    /// Follow `@odata.nextLink` until exhausted
    ///
    /// A failure on the first page is an error. A failure on a later page
    /// stops pagination and keeps what was already fetched, with a warning.
    /// Links that repeat a fetched URL or leave the first page's origin end
    /// pagination the same way; the bearer token never goes to another host.
    async fn fetch_all<T: DeserializeOwned>(&self, first: Url) -> Result<FetchOutcome<T>, FetchError> {
        let mut outcome = FetchOutcome::default();
        let mut visited = HashSet::new();
        let mut next = Some(first.clone());

        while let Some(url) = next.take() {
            visited.insert(url.to_string());
            match self.get_page::<T>(url.as_str()).await {
                Ok(page) => {
                    outcome.pages_fetched += 1;
                    tracing::debug!(
                        url = %url,
                        page = outcome.pages_fetched,
                        items = page.value.len(),
                        "Fetched Graph page"
                    );
                    outcome.items.extend(page.value);

                    if let Some(link) = page.next_link {
                        match next_page_url(&link, &first, &visited) {
                            Ok(url) => next = Some(url),
                            Err(reason) => {
                                tracing::warn!(link = %link, "Refusing Graph nextLink: {}", reason);
                                outcome.warnings.push(format!(
                                    "Graph pagination stopped after {} page(s): {}",
                                    outcome.pages_fetched, reason
                                ));
                            }
                        }
                    }
                }
                Err(e) if outcome.pages_fetched == 0 => return Err(e),
                Err(e) => {
                    let warning = format!(
                        "Graph pagination stopped after {} page(s): {}",
                        outcome.pages_fetched, e
                    );
                    tracing::warn!(url = %url, error = %e, "Graph page failed; returning partial data");
                    outcome.warnings.push(warning);
                }
            }
        }

        Ok(outcome)
    }

    async fn get_page<T: DeserializeOwned>(&self, url: &str) -> Result<GraphPage<T>, FetchError> {
        let token = self
            .access_token
            .as_deref()
            .ok_or_else(|| FetchError::NotConfigured("Graph access token".to_string()))?;

        let response = self
            .http_client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| FetchError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status == 401 || status == 403 {
            return Err(FetchError::Unauthorized(format!("Graph returned {}", status.as_u16())));
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

    fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| FetchError::NotConfigured(format!("Graph base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::NotConfigured("Graph base URL cannot hold a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl RecordSource for GraphClient {
    async fn fetch(&self, window: &FetchWindow) -> SourceBatch {
        let mut batch = SourceBatch::empty(SourceTag::Bookings);

        if !self.is_configured() {
            return batch.with_warning("Bookings not configured: no Graph access token");
        }

        let businesses = match self.list_businesses().await {
            Ok(businesses) => businesses,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list booking businesses");
                return batch.with_warning(format!("Could not list Bookings businesses: {}", e));
            }
        };

        let selected = businesses.iter().filter(|b| match window.business.as_deref() {
            Some(wanted) => b.id == wanted || b.display_name.eq_ignore_ascii_case(wanted),
            None => true,
        });

        for business in selected {
            match self.fetch_appointments(&business.id).await {
                Ok(outcome) => {
                    batch.pages_fetched += outcome.pages_fetched;
                    batch.warnings.extend(
                        outcome
                            .warnings
                            .into_iter()
                            .map(|w| format!("{}: {}", business.display_name, w)),
                    );
                    for raw in outcome.items {
                        match normalizer::booking_from_value(raw, &business.display_name) {
                            Ok(record) if normalizer::in_window(&record, window) => {
                                batch.records.push(record)
                            }
                            Ok(_) => {}
                            Err(issue) => batch.rejected.push(issue),
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(business = %business.display_name, error = %e, "Appointment fetch failed");
                    batch
                        .warnings
                        .push(format!("{}: appointments unavailable: {}", business.display_name, e));
                }
            }
        }

        tracing::info!(
            records = batch.records.len(),
            pages = batch.pages_fetched,
            warnings = batch.warnings.len(),
            "Bookings fetch complete"
        );
        batch
    }

    async fn business_units(&self) -> Result<Vec<BusinessUnit>, FetchError> {
        Ok(self
            .list_businesses()
            .await?
            .into_iter()
            .map(|b| BusinessUnit {
                id: b.id,
                name: b.display_name,
            })
            .collect())
    }
}

/// Validate a `@odata.nextLink` against the first page and pages already fetched
fn next_page_url(link: &str, first: &Url, visited: &HashSet<String>) -> Result<Url, String> {
    let url = Url::parse(link).map_err(|e| format!("invalid nextLink: {}", e))?;
    if url.origin() != first.origin() {
        return Err(format!("nextLink leaves {}", first.origin().ascii_serialization()));
    }
    if visited.contains(url.as_str()) {
        return Err("nextLink repeats an already fetched page".to_string());
    }
    Ok(url)
}
