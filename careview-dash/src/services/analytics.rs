//! Summary views over the reconciled appointment table
//!
//! Each merged record counts once, represented by its primary record.

use careview_common::time::local_date;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::similarity::client_key;
use crate::models::{AppointmentStatus, MergedRecord, Record};

const UNSPECIFIED_SERVICE: &str = "Unspecified";
const UNASSIGNED_BUSINESS: &str = "Unassigned";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusBreakdown {
    pub total: usize,
    pub scheduled: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub no_show: usize,
    /// Percent of all appointments, two decimals
    pub cancellation_rate: f64,
    pub no_show_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub total: usize,
    pub cancelled: usize,
    pub completed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceStats {
    pub service: String,
    pub count: usize,
    pub avg_duration: Option<f64>,
    pub min_duration: Option<f64>,
    pub max_duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientFrequency {
    /// Email when known, otherwise the normalized name
    pub client: String,
    pub appointments: usize,
    pub unique_businesses: usize,
    pub total_duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusinessSummary {
    pub business: String,
    pub total: usize,
    pub avg_duration: Option<f64>,
    pub cancellation_rate: f64,
    pub unique_services: usize,
    pub unique_clients: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Analytics {
    pub status: StatusBreakdown,
    pub daily_trend: Vec<DailyCount>,
    pub service_mix: Vec<ServiceStats>,
    pub client_frequency: Vec<ClientFrequency>,
    pub business_summary: Vec<BusinessSummary>,
}

/// Compute every view in one pass over the table
pub fn compute(merged: &[MergedRecord], utc_offset_minutes: i32) -> Analytics {
    let records: Vec<&Record> = merged.iter().map(|m| &m.record).collect();

    Analytics {
        status: status_breakdown(&records),
        daily_trend: daily_trend(&records, utc_offset_minutes),
        service_mix: service_mix(&records),
        client_frequency: client_frequency(&records),
        business_summary: business_summary(&records),
    }
}

pub fn status_breakdown(records: &[&Record]) -> StatusBreakdown {
    let mut breakdown = StatusBreakdown {
        total: records.len(),
        ..StatusBreakdown::default()
    };

    for record in records {
        match record.status {
            AppointmentStatus::Scheduled => breakdown.scheduled += 1,
            AppointmentStatus::Completed => breakdown.completed += 1,
            AppointmentStatus::Cancelled => breakdown.cancelled += 1,
            AppointmentStatus::NoShow => breakdown.no_show += 1,
        }
    }

    breakdown.cancellation_rate = percent(breakdown.cancelled, breakdown.total);
    breakdown.no_show_rate = percent(breakdown.no_show, breakdown.total);
    breakdown
}

/// Per local calendar day, ascending; undated records are skipped
pub fn daily_trend(records: &[&Record], utc_offset_minutes: i32) -> Vec<DailyCount> {
    let mut days: BTreeMap<NaiveDate, DailyCount> = BTreeMap::new();

    for record in records {
        let Some(ts) = record.timestamp else { continue };
        let date = local_date(&ts, utc_offset_minutes);
        let day = days.entry(date).or_insert(DailyCount {
            date,
            total: 0,
            cancelled: 0,
            completed: 0,
        });
        day.total += 1;
        match record.status {
            AppointmentStatus::Cancelled => day.cancelled += 1,
            AppointmentStatus::Completed => day.completed += 1,
            _ => {}
        }
    }

    days.into_values().collect()
}

/// Count and duration spread per service, busiest first
pub fn service_mix(records: &[&Record]) -> Vec<ServiceStats> {
    let mut groups: BTreeMap<String, (usize, Vec<f64>)> = BTreeMap::new();

    for record in records {
        let service = record
            .service
            .clone()
            .unwrap_or_else(|| UNSPECIFIED_SERVICE.to_string());
        let entry = groups.entry(service).or_default();
        entry.0 += 1;
        if let Some(d) = record.duration_minutes {
            entry.1.push(d);
        }
    }

    let mut mix: Vec<ServiceStats> = groups
        .into_iter()
        .map(|(service, (count, durations))| ServiceStats {
            service,
            count,
            avg_duration: mean(&durations),
            min_duration: durations.iter().copied().reduce(f64::min),
            max_duration: durations.iter().copied().reduce(f64::max),
        })
        .collect();

    // Stable sort keeps the alphabetical order among equal counts
    mix.sort_by(|a, b| b.count.cmp(&a.count));
    mix
}

/// Visits per client, most frequent first
pub fn client_frequency(records: &[&Record]) -> Vec<ClientFrequency> {
    let mut clients: BTreeMap<String, (usize, BTreeSet<String>, f64)> = BTreeMap::new();

    for record in records {
        let Some(client) = client_identity(record) else { continue };
        let entry = clients.entry(client).or_default();
        entry.0 += 1;
        if let Some(business) = &record.business {
            entry.1.insert(business.clone());
        }
        entry.2 += record.duration_minutes.unwrap_or(0.0);
    }

    let mut frequency: Vec<ClientFrequency> = clients
        .into_iter()
        .map(|(client, (appointments, businesses, duration))| ClientFrequency {
            client,
            appointments,
            unique_businesses: businesses.len(),
            total_duration: round2(duration),
        })
        .collect();

    frequency.sort_by(|a, b| b.appointments.cmp(&a.appointments));
    frequency
}

/// Per business unit, alphabetical
pub fn business_summary(records: &[&Record]) -> Vec<BusinessSummary> {
    let mut groups: BTreeMap<String, Vec<&Record>> = BTreeMap::new();
    for record in records {
        let business = record
            .business
            .clone()
            .unwrap_or_else(|| UNASSIGNED_BUSINESS.to_string());
        groups.entry(business).or_default().push(*record);
    }

    groups
        .into_iter()
        .map(|(business, members)| {
            let durations: Vec<f64> = members.iter().filter_map(|r| r.duration_minutes).collect();
            let cancelled = members
                .iter()
                .filter(|r| r.status == AppointmentStatus::Cancelled)
                .count();
            let services: BTreeSet<&str> = members.iter().filter_map(|r| r.service.as_deref()).collect();
            let clients: BTreeSet<String> = members.iter().filter_map(|r| client_identity(r)).collect();

            BusinessSummary {
                business,
                total: members.len(),
                avg_duration: mean(&durations),
                cancellation_rate: percent(cancelled, members.len()),
                unique_services: services.len(),
                unique_clients: clients.len(),
            }
        })
        .collect()
}

fn client_identity(record: &Record) -> Option<String> {
    if let Some(email) = record.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        return Some(email.to_lowercase());
    }
    let key = client_key(&record.client_name);
    (!key.is_empty()).then_some(key)
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(part as f64 / total as f64 * 100.0)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(round2(values.iter().sum::<f64>() / values.len() as f64))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
