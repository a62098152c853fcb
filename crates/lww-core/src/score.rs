//! Timestamp <-> score conversion for sorted-set backends
//!
//! Durable stores sort members by an IEEE 754 double. A timestamp is rounded
//! to the nearest microsecond and stored as the integer count of microseconds
//! since the Unix epoch. Only integers up to 2^53 are exact in a double, which
//! caps the range at roughly +/-285 years around 1970.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};

/// Point in time attached to every add and remove
pub type Timestamp = DateTime<Utc>;

/// Largest magnitude (in microseconds) a score can hold without losing integers
pub const MAX_SCORE_MICROS: i64 = 1 << 53;

/// Round a timestamp to whole microseconds since the epoch (half-up)
///
/// Leap-second nanoseconds (>= 1s) carry into the following second.
pub fn to_micros(at: &Timestamp) -> Result<i64> {
    let round_up = i64::from((at.timestamp_subsec_nanos() + 500) / 1_000);
    at.timestamp()
        .checked_mul(1_000_000)
        .and_then(|micros| micros.checked_add(round_up))
        .filter(|micros| micros.abs() <= MAX_SCORE_MICROS)
        .ok_or_else(|| Error::TimestampOutOfRange(at.to_rfc3339()))
}

/// Encode a timestamp as a sorted-set score
pub fn to_score(at: &Timestamp) -> Result<f64> {
    to_micros(at).map(|micros| micros as f64)
}

/// Decode a sorted-set score back into a timestamp
pub fn from_score(score: f64) -> Result<Timestamp> {
    if !score.is_finite() || score.abs() > MAX_SCORE_MICROS as f64 {
        return Err(Error::TimestampOutOfRange(format!("score {}", score)));
    }

    DateTime::from_timestamp_micros(score.round() as i64)
        .ok_or_else(|| Error::TimestampOutOfRange(format!("score {}", score)))
}

/// Timestamp as it reads back after a trip through a durable store
pub fn truncate(at: &Timestamp) -> Result<Timestamp> {
    from_score(to_score(at)?)
}
