//! Time representation for replay timelines.
//! Every track position, duration and seek target is a signed millisecond count
//! from the start of the recorded session.

/// Milliseconds since session start
/// This is the core time representation throughout the crate
pub type TimeMs = i64;

/// Time constants for conversions
pub mod constants {
    use super::TimeMs;

    pub const MILLIS_PER_SECOND: TimeMs = 1_000;
    pub const MILLIS_PER_MINUTE: TimeMs = 60 * MILLIS_PER_SECOND;
    pub const MILLIS_PER_HOUR: TimeMs = 60 * MILLIS_PER_MINUTE;
}

/// Time zero constant
pub const ZERO: TimeMs = 0;

/// Convert seconds (f64) to milliseconds
#[inline]
pub fn from_seconds(seconds: f64) -> TimeMs {
    (seconds * constants::MILLIS_PER_SECOND as f64).round() as TimeMs
}

/// Convert milliseconds to seconds (f64)
#[inline]
pub fn to_seconds(millis: TimeMs) -> f64 {
    millis as f64 / constants::MILLIS_PER_SECOND as f64
}

/// Convert a `Duration` to milliseconds, saturating at `TimeMs::MAX`
#[inline]
pub fn from_duration(duration: std::time::Duration) -> TimeMs {
    TimeMs::try_from(duration.as_millis()).unwrap_or(TimeMs::MAX)
}

/// Absolute distance between two positions
#[inline]
pub fn distance(a: TimeMs, b: TimeMs) -> TimeMs {
    a.saturating_sub(b).saturating_abs()
}

/// Format a position as MM:SS, or H:MM:SS once past the first hour.
/// Negative positions are clamped to zero.
pub fn format_time(millis: TimeMs) -> String {
    let millis = millis.max(ZERO);
    let hours = millis / constants::MILLIS_PER_HOUR;
    let minutes = (millis % constants::MILLIS_PER_HOUR) / constants::MILLIS_PER_MINUTE;
    let seconds = (millis % constants::MILLIS_PER_MINUTE) / constants::MILLIS_PER_SECOND;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
