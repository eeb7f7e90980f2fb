//! Timestamp utilities

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Build a fixed offset from minutes east of UTC, clamping to UTC when out of range
pub fn fixed_offset(utc_offset_minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
}

/// Calendar date of a timestamp in the given local offset
pub fn local_date(ts: &DateTime<Utc>, utc_offset_minutes: i32) -> NaiveDate {
    ts.with_timezone(&fixed_offset(utc_offset_minutes)).date_naive()
}

/// Parse the timestamp shapes seen in upstream payloads
///
/// Accepts RFC 3339 (`2024-01-05T10:00:00Z`, `...+02:00`), naive date-times
/// with or without seconds/fractions (`2024-01-05T10:00`, Graph's
/// `2024-01-05T10:00:00.0000000`), and bare dates (`2024-01-05`, midnight).
/// Naive values are taken as UTC, which is how Graph reports them.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
