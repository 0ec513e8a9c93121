use chrono::{DateTime, FixedOffset, NaiveDateTime};

use crate::error::{ParkcastError, Result};

/// Offset-aware layouts seen in `parking_readings.timestamp`.
const OFFSET_FORMATS: &[&str] = &[
    // go-sqlite3 default for time.Time columns
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    // Go time.String() once the trailing zone name is removed
    "%Y-%m-%d %H:%M:%S%.f %z",
];

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse a stored reading timestamp.
///
/// Offset-less timestamps are read as UTC. Calendar features are derived
/// from the wall clock of whatever offset was recorded.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>> {
    let s = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt);
    }

    let s = strip_zone_name(s);
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc().fixed_offset());
        }
    }

    Err(ParkcastError::InvalidTimestamp(raw.to_string()))
}

/// "2024-03-04 09:15:00 +0100 CET" -> "2024-03-04 09:15:00 +0100"
fn strip_zone_name(s: &str) -> &str {
    match s.rsplit_once(' ') {
        Some((head, tail))
            if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_alphabetic()) =>
        {
            head
        }
        _ => s,
    }
}
