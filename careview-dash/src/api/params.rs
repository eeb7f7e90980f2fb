//! Query parameters shared by the dashboard and cancellation endpoints

use careview_common::config::{ClaimPolicy, MAX_TOLERANCE_HOURS};
use careview_common::time::{local_date, now};
use careview_common::TomlConfig;
use chrono::{Duration, NaiveDate};
use serde::Deserialize;

use crate::error::ApiError;
use crate::services::dashboard::DatePreset;
use crate::services::reconciler::{ReconcileConfig, Tolerance};
use crate::services::FetchWindow;

/// `?start=&end=&preset=&business=&threshold=&tolerance_hours=&same_day=&claim_policy=`
///
/// Anything omitted falls back to the TOML configuration. Without dates the
/// range is the last 30 days.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardParams {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub preset: Option<DatePreset>,
    pub business: Option<String>,
    pub threshold: Option<u8>,
    pub tolerance_hours: Option<i64>,
    pub same_day: Option<bool>,
    pub claim_policy: Option<ClaimPolicy>,
}

impl DashboardParams {
    /// Date range and business filter
    pub fn window(&self, config: &TomlConfig) -> Result<FetchWindow, ApiError> {
        let offset = config.display.utc_offset_minutes;
        let today = local_date(&now(), offset);
        self.window_at(today, offset)
    }

    /// Same as [`window`](Self::window) with an explicit "today"
    pub fn window_at(&self, today: NaiveDate, utc_offset_minutes: i32) -> Result<FetchWindow, ApiError> {
        let (start, end) = match (self.start, self.end, self.preset) {
            (Some(start), Some(end), _) => (start, end),
            (Some(start), None, _) => (start, today),
            (None, Some(end), _) => {
                let start = end
                    .checked_sub_signed(Duration::days(30))
                    .ok_or_else(|| ApiError::BadRequest(format!("end date out of range: {}", end)))?;
                (start, end)
            }
            (None, None, Some(preset)) => preset.range(today),
            (None, None, None) => DatePreset::Last30Days.range(today),
        };

        if start > end {
            return Err(ApiError::BadRequest(format!(
                "start ({}) is after end ({})",
                start, end
            )));
        }

        let business = self
            .business
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string);

        Ok(FetchWindow {
            start,
            end,
            business,
            utc_offset_minutes,
        })
    }

    /// Matching parameters, request values over configured defaults
    pub fn reconcile_config(&self, config: &TomlConfig) -> Result<ReconcileConfig, ApiError> {
        let mut result = ReconcileConfig::from_settings(&config.reconcile, config.display.utc_offset_minutes);

        if let Some(threshold) = self.threshold {
            if threshold > 100 {
                return Err(ApiError::BadRequest(format!(
                    "threshold must be 0-100, got {}",
                    threshold
                )));
            }
            result.threshold = threshold;
        }

        if let Some(hours) = self.tolerance_hours {
            let window = (0..=MAX_TOLERANCE_HOURS)
                .contains(&hours)
                .then(|| Duration::try_hours(hours))
                .flatten()
                .ok_or_else(|| {
                    ApiError::BadRequest(format!(
                        "tolerance_hours must be 0-{}, got {}",
                        MAX_TOLERANCE_HOURS, hours
                    ))
                })?;
            result.tolerance = Tolerance::Window(window);
        }

        if self.same_day == Some(true) {
            result.tolerance = Tolerance::SameDay {
                utc_offset_minutes: config.display.utc_offset_minutes,
            };
        }

        if let Some(policy) = self.claim_policy {
            result.claim_policy = policy;
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_default_range_is_last_30_days() {
        let window = DashboardParams::default().window_at(date("2024-03-31"), 0).unwrap();
        assert_eq!((window.start, window.end), (date("2024-03-01"), date("2024-03-31")));
    }

    #[test]
    fn test_explicit_dates_beat_preset() {
        let params = DashboardParams {
            start: Some(date("2024-01-01")),
            end: Some(date("2024-01-10")),
            preset: Some(DatePreset::ThisMonth),
            ..Default::default()
        };
        let window = params.window_at(date("2024-03-31"), 0).unwrap();
        assert_eq!(window.start, date("2024-01-01"));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let params = DashboardParams {
            start: Some(date("2024-02-01")),
            end: Some(date("2024-01-01")),
            ..Default::default()
        };
        assert!(matches!(params.window_at(date("2024-03-31"), 0), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_end_near_min_date_rejected() {
        let params = DashboardParams {
            end: Some(NaiveDate::MIN),
            ..Default::default()
        };
        assert!(matches!(params.window_at(date("2024-03-31"), 0), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_huge_tolerance_rejected() {
        let config = TomlConfig::default();
        for hours in [i64::MAX, MAX_TOLERANCE_HOURS + 1, -1] {
            let params = DashboardParams {
                tolerance_hours: Some(hours),
                ..Default::default()
            };
            assert!(matches!(params.reconcile_config(&config), Err(ApiError::BadRequest(_))));
        }
    }

    #[test]
    fn test_blank_business_ignored() {
        let params = DashboardParams {
            business: Some("  ".into()),
            ..Default::default()
        };
        assert!(params.window_at(date("2024-03-31"), 0).unwrap().business.is_none());
    }

    #[test]
    fn test_reconcile_overrides() {
        let config = TomlConfig::default();
        let params = DashboardParams {
            threshold: Some(90),
            tolerance_hours: Some(2),
            claim_policy: Some(ClaimPolicy::Shared),
            ..Default::default()
        };
        let rc = params.reconcile_config(&config).unwrap();
        assert_eq!(rc.threshold, 90);
        assert_eq!(rc.tolerance, Tolerance::Window(Duration::hours(2)));
        assert_eq!(rc.claim_policy, ClaimPolicy::Shared);

        let same_day = DashboardParams {
            same_day: Some(true),
            ..Default::default()
        };
        assert_eq!(
            same_day.reconcile_config(&config).unwrap().tolerance,
            Tolerance::SameDay { utc_offset_minutes: -300 }
        );

        let bad = DashboardParams {
            threshold: Some(101),
            ..Default::default()
        };
        assert!(bad.reconcile_config(&config).is_err());
    }
}
