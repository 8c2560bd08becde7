//! Timestamp utilities

use crate::{Error, Result};
use chrono::NaiveDateTime;

/// Format accepted for textual listen timestamps (e.g. `2024-03-01T18:22:05Z`)
pub const ISO8601_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Convert an ISO 8601 UTC timestamp string to Unix seconds
pub fn iso8601_to_unix(value: &str) -> Result<i64> {
    let parsed = NaiveDateTime::parse_from_str(value.trim(), ISO8601_FORMAT).map_err(|e| {
        Error::InvalidInput(format!("Invalid timestamp '{}': {}", value, e))
    })?;
    Ok(parsed.and_utc().timestamp())
}

/// Convert seconds (possibly fractional) to a duration, clamping negatives to zero
pub fn secs_to_duration(secs: f64) -> std::time::Duration {
    if secs.is_finite() && secs > 0.0 {
        std::time::Duration::from_secs_f64(secs)
    } else {
        std::time::Duration::ZERO
    }
}
