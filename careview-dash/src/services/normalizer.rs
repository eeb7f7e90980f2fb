//! Upstream payload → common [`Record`] schema

use careview_common::config::AirtableFieldMap;
use careview_common::time::{fixed_offset, local_date, parse_timestamp};
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use super::airtable_client::AirtableRecord;
use super::graph_client::{BookingAppointment, GraphDateTime};
use super::source::FetchWindow;
use crate::models::{AppointmentStatus, DataQualityIssue, Record, SourceTag};

/// Convert a raw Graph appointment, rejecting payloads that are not appointments at all
pub fn booking_from_value(raw: Value, business: &str) -> Result<Record, DataQualityIssue> {
    let fallback_id = raw.get("id").and_then(Value::as_str).map(str::to_string);

    let appt = serde_json::from_value::<BookingAppointment>(raw).map_err(|e| {
        DataQualityIssue::new(
            SourceTag::Bookings,
            fallback_id,
            format!("malformed appointment payload: {}", e),
        )
    })?;
    from_booking(&appt, business)
}

/// Map a Bookings appointment to a record
///
/// Status precedence: cancelled, completed, no-show, scheduled. An
/// appointment whose time zone cannot be resolved is rejected.
pub fn from_booking(appt: &BookingAppointment, business: &str) -> Result<Record, DataQualityIssue> {
    let resolve = |dt: Option<&GraphDateTime>| {
        dt.map(graph_timestamp).transpose().map(Option::flatten).map_err(|reason| {
            DataQualityIssue::new(SourceTag::Bookings, appt.id.clone(), reason)
        })
    };
    let start = resolve(appt.start_date_time.as_ref())?;
    let end = resolve(appt.end_date_time.as_ref())?;

    let status = if is_set(&appt.cancelled_date_time) {
        AppointmentStatus::Cancelled
    } else if is_set(&appt.completed_date_time) {
        AppointmentStatus::Completed
    } else if appt.is_no_show == Some(true) {
        AppointmentStatus::NoShow
    } else {
        AppointmentStatus::Scheduled
    };

    let duration_minutes = match (start, end) {
        (Some(s), Some(e)) if e >= s => Some((e - s).num_seconds() as f64 / 60.0),
        _ => None,
    };

    Ok(Record {
        id: appt.id.clone().unwrap_or_default(),
        client_name: appt.customer_name.clone().unwrap_or_default().trim().to_string(),
        timestamp: start,
        status,
        source: SourceTag::Bookings,
        business: non_blank(Some(business)),
        service: non_blank(appt.service_name.as_deref()),
        email: non_blank(appt.customer_email_address.as_deref()),
        phone: non_blank(appt.customers.first().and_then(|c| c.phone.as_deref())),
        duration_minutes,
        notes: non_blank(appt.customer_notes.as_deref()),
    })
}

/// Map an Airtable row to a record through the configured field names
///
/// Date-only values mean local midnight at `utc_offset_minutes`.
pub fn from_airtable(rec: &AirtableRecord, fields: &AirtableFieldMap, utc_offset_minutes: i32) -> Record {
    let text = |name: &str| rec.fields.get(name).and_then(field_text);

    Record {
        id: rec.id.clone(),
        client_name: text(fields.name.as_str()).unwrap_or_default(),
        timestamp: text(fields.date.as_str()).and_then(|raw| airtable_timestamp(&raw, utc_offset_minutes)),
        status: text(fields.status.as_str())
            .map(|s| AppointmentStatus::from_label(&s))
            .unwrap_or_default(),
        source: SourceTag::Airtable,
        business: text(fields.business.as_str()),
        service: text(fields.service.as_str()),
        email: text(fields.email.as_str()),
        phone: text(fields.phone.as_str()),
        duration_minutes: rec.fields.get(&fields.duration).and_then(field_number),
        notes: None,
    }
}

/// Whether a record falls inside the window's dates and business filter
///
/// Records without a timestamp pass, so they surface as data-quality issues.
pub fn in_window(record: &Record, window: &FetchWindow) -> bool {
    if let Some(ts) = record.timestamp {
        let day = local_date(&ts, window.utc_offset_minutes);
        if day < window.start || day > window.end {
            return false;
        }
    }

    match (window.business.as_deref(), record.business.as_deref()) {
        (Some(wanted), Some(actual)) => actual.eq_ignore_ascii_case(wanted),
        (Some(_), None) => false,
        (None, _) => true,
    }
}

fn airtable_timestamp(raw: &str, utc_offset_minutes: i32) -> Option<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0)?;
        return fixed_offset(utc_offset_minutes)
            .from_local_datetime(&midnight)
            .single()
            .map(|dt| dt.with_timezone(&Utc));
    }
    parse_timestamp(raw)
}

/// Resolve a Graph `dateTimeTimeZone` to UTC
///
/// `dateTime` is wall-clock time in `timeZone`. UTC names, a missing zone and
/// fixed offsets (`+02:00`, `UTC-05:00`) are honored. Named regional zones
/// are reported rather than guessed.
fn graph_timestamp(dt: &GraphDateTime) -> Result<Option<DateTime<Utc>>, String> {
    let Some(wall) = parse_timestamp(&dt.date_time) else {
        return Ok(None);
    };

    let zone = dt.time_zone.as_deref().map(str::trim).unwrap_or("");
    if zone.is_empty() || ["UTC", "Etc/UTC", "GMT", "Z"].iter().any(|u| zone.eq_ignore_ascii_case(u)) {
        return Ok(Some(wall));
    }

    let offset_text = zone
        .strip_prefix("UTC")
        .or_else(|| zone.strip_prefix("GMT"))
        .unwrap_or(zone);
    let offset: FixedOffset = offset_text
        .parse()
        .map_err(|_| format!("unsupported time zone: {}", zone))?;

    offset
        .from_local_datetime(&wall.naive_utc())
        .single()
        .map(|local| Some(local.with_timezone(&Utc)))
        .ok_or_else(|| format!("invalid local time {} in {}", dt.date_time, zone))
}

/// Text from a cell: strings, numbers, lists (first entry) or `{name}` objects
fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_blank(Some(s)),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.iter().find_map(field_text),
        Value::Object(map) => map.get("name").and_then(field_text),
        _ => None,
    }
}

fn field_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
