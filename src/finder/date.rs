//! Timestamp conversion into the 1904-based legacy epoch

use crate::error::CodecError;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

/// Seconds between 1904-01-01 and 1970-01-01
pub const LEGACY_EPOCH_OFFSET: i64 = 2_082_844_800;

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f %:z", "%Y-%m-%dT%H:%M:%S%.f%:z"];
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Convert an extractor timestamp into legacy epoch seconds, clamped to `[1970, now]`
pub fn convert_date(date: &str) -> Result<u32, CodecError> {
    convert_date_at(date, Utc::now())
}

/// Same as [`convert_date`] with an explicit notion of "now"
pub fn convert_date_at(date: &str, now: DateTime<Utc>) -> Result<u32, CodecError> {
    let parsed = parse_timestamp(date)?;
    let unix = parsed.timestamp().clamp(0, now.timestamp().max(0));
    to_legacy_seconds(unix)
}

/// Shift Unix seconds into the legacy epoch
pub fn to_legacy_seconds(unix_seconds: i64) -> Result<u32, CodecError> {
    u32::try_from(unix_seconds + LEGACY_EPOCH_OFFSET).map_err(|_| {
        CodecError::InvalidDate(format!(
            "{} is outside the legacy timestamp range",
            unix_seconds
        ))
    })
}

/// Inverse of [`to_legacy_seconds`]
pub fn from_legacy_seconds(legacy: u32) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(legacy as i64 - LEGACY_EPOCH_OFFSET, 0)
}

fn parse_timestamp(date: &str) -> Result<DateTime<FixedOffset>, CodecError> {
    // The extractor writes "+0000" where ISO 8601 wants "+00:00".
    let normalized = date.trim().replace(" +0000", " +00:00");

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&normalized) {
        return Ok(parsed);
    }
    for format in OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(&normalized, format) {
            return Ok(parsed);
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, format) {
            return Ok(naive.and_utc().fixed_offset());
        }
    }
    Err(CodecError::InvalidDate(date.to_string()))
}
