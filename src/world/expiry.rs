//! Remaining-Time Text
//!
//! Converts absolute expiry and impact timestamps into the short labels shown
//! next to loot, hazards and incoming projectiles.

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

use crate::core::clock::Clock;

/// Label for loot and hazards whose expiry has passed.
pub const EXPIRED: &str = "Expired";

/// Label for projectiles whose impact time has passed.
pub const IMPACTED: &str = "Impacted";

/// Timestamp errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    /// Not an ISO-8601 timestamp.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Parse an ISO-8601 timestamp.
///
/// Accepts RFC 3339 with an offset, and offset-less forms which are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, TemporalError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(TemporalError::InvalidTimestamp(raw.to_string()))
}

fn plural(count: i64, singular: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}s", count, singular)
    }
}

/// Expiry label for loot and hazards.
///
/// - past: `Expired`
/// - under an hour: `Expires in: 12 min`
/// - under a day: `Expires in: 1 hour 30 min`
/// - otherwise: `Expires in: 2 days 3 hours`
pub fn format_expiry(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = expires_at.signed_duration_since(now);
    if delta.num_milliseconds() < 0 {
        return EXPIRED.to_string();
    }

    let minutes = delta.num_minutes();
    if minutes < 60 {
        return format!("Expires in: {} min", minutes);
    }

    let hours = delta.num_hours();
    if hours < 24 {
        let rem_minutes = minutes % 60;
        return if rem_minutes > 0 {
            format!("Expires in: {} {} min", plural(hours, "hour"), rem_minutes)
        } else {
            format!("Expires in: {}", plural(hours, "hour"))
        };
    }

    let days = delta.num_days();
    let rem_hours = hours % 24;
    if rem_hours > 0 {
        format!("Expires in: {} {}", plural(days, "day"), plural(rem_hours, "hour"))
    } else {
        format!("Expires in: {}", plural(days, "day"))
    }
}

/// Time-to-impact label for projectiles.
///
/// - past: `Impacted`
/// - under an hour: `42 min`
/// - one hour: `1 hour`
/// - otherwise whole hours: `3 hours`
pub fn format_impact(impact_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = impact_at.signed_duration_since(now);
    if delta.num_milliseconds() < 0 {
        return IMPACTED.to_string();
    }

    let minutes = delta.num_minutes();
    if minutes < 60 {
        return format!("{} min", minutes);
    }

    plural(delta.num_hours(), "hour")
}

/// Expiry label for an ISO-8601 timestamp.
pub fn expiry_text(timestamp: &str, clock: &dyn Clock) -> Result<String, TemporalError> {
    Ok(format_expiry(parse_timestamp(timestamp)?, clock.now()))
}

/// Impact label for an ISO-8601 timestamp.
pub fn impact_text(timestamp: &str, clock: &dyn Clock) -> Result<String, TemporalError> {
    Ok(format_impact(parse_timestamp(timestamp)?, clock.now()))
}
