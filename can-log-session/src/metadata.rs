//! Session header metadata helpers

use crate::session::LogSession;
use crate::types::{Result, SessionError, Timestamp};
use chrono::Duration;

/// Fixed-width format of split timestamps (YYYYMMDDHHMMSS)
pub const SPLIT_FORMAT: &str = "%Y%m%d%H%M%S";

/// Absolute recording start from the session header
pub fn session_start(session: &LogSession) -> Timestamp {
    session.start_time()
}

/// First relative timestamp (seconds) of the named channel
pub fn first_timestamp(session: &LogSession, channel: &str) -> Result<f64> {
    let (group, _) = session
        .find_channel(channel)
        .ok_or_else(|| SessionError::NameNotFound(channel.to_string()))?;
    group
        .timestamps
        .first()
        .copied()
        .ok_or_else(|| SessionError::NameNotFound(format!("{} (no samples)", channel)))
}

/// Absolute time of the named channel's first sample
pub fn split_start(session: &LogSession, channel: &str) -> Result<Timestamp> {
    let delta = first_timestamp(session, channel)?;
    offset_time(session_start(session), delta).ok_or_else(|| {
        SessionError::LogFormat(format!(
            "First timestamp {} of '{}' is outside the calendar range",
            delta, channel
        ))
    })
}

/// Render a split timestamp as `YYYYMMDDHHMMSS`
pub fn format_split_start(timestamp: &Timestamp) -> String {
    timestamp.format(SPLIT_FORMAT).to_string()
}

/// `start` shifted by fractional seconds (microsecond resolution)
///
/// None for non-finite offsets and results chrono cannot represent.
pub(crate) fn offset_time(start: Timestamp, seconds: f64) -> Option<Timestamp> {
    let micros = (seconds * 1_000_000.0).round();
    if !micros.is_finite() || micros < i64::MIN as f64 || micros >= i64::MAX as f64 {
        return None;
    }
    start.checked_add_signed(Duration::microseconds(micros as i64))
}
