//! Common appointment record schema
//!
//! Both upstream sources are normalized into [`Record`] before reconciliation.

use careview_common::time::parse_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Which upstream system a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    /// Microsoft Bookings (via Graph)
    Bookings,
    Airtable,
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceTag::Bookings => write!(f, "bookings"),
            SourceTag::Airtable => write!(f, "airtable"),
        }
    }
}

/// Appointment lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    /// Parse free-text status labels as typed by schedulers
    ///
    /// Case-insensitive; unknown or blank labels read as `Scheduled`.
    pub fn from_label(label: &str) -> Self {
        let cleaned: String = label
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();

        match cleaned.as_str() {
            "noshow" => AppointmentStatus::NoShow,
            "cancelled" | "canceled" => AppointmentStatus::Cancelled,
            "completed" | "complete" | "done" => AppointmentStatus::Completed,
            _ => AppointmentStatus::Scheduled,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }
}

impl<'de> Deserialize<'de> for AppointmentStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(AppointmentStatus::from_label(&label))
    }
}

/// One appointment from one source
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Record {
    /// Upstream identifier; empty when the source omitted it
    #[serde(default)]
    pub id: String,
    /// Client name as entered upstream
    #[serde(default)]
    pub client_name: String,
    /// Start time; `None` when missing or unparseable
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: AppointmentStatus,
    pub source: SourceTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Record {
    /// Minimal record with only the fields used for matching
    pub fn new(
        source: SourceTag,
        id: impl Into<String>,
        client_name: impl Into<String>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: id.into(),
            client_name: client_name.into(),
            timestamp,
            status: AppointmentStatus::Scheduled,
            source,
            business: None,
            service: None,
            email: None,
            phone: None,
            duration_minutes: None,
            notes: None,
        }
    }

    pub fn with_status(mut self, status: AppointmentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_business(mut self, business: impl Into<String>) -> Self {
        self.business = Some(business.into());
        self
    }
}

/// Accept any timestamp shape `parse_timestamp` understands; garbage becomes `None`
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}
