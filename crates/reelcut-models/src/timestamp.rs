//! Timestamp parsing and formatting utilities.
//!
//! Canonical timestamps are `HH:MM:SS` strings. Parsing is lenient about the
//! number of components (`SS`, `MM:SS`, `HH:MM:SS`) but strict about range:
//! minutes and seconds must stay below 60 whenever a larger unit is present.

use thiserror::Error;

/// Maximum reasonable video duration (24 hours in seconds).
pub const MAX_VIDEO_DURATION_SECS: f64 = 86400.0;

/// Timestamp parsing error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimestampError {
    #[error("Timestamp cannot be empty")]
    Empty,

    #[error("Timestamp cannot be negative")]
    Negative,

    #[error("Invalid {0} value: {1}")]
    InvalidValue(&'static str, String),

    #[error("Invalid timestamp format '{0}'. Use HH:MM:SS, MM:SS or SS")]
    InvalidFormat(String),

    #[error("{0} must be below 60 (got {1})")]
    ComponentOutOfRange(&'static str, u32),
}

/// Parse a timestamp string to total seconds.
///
/// Supports `HH:MM:SS`, `MM:SS` and `SS`, each optionally with a fractional
/// seconds part.
///
/// # Examples
/// ```
/// use reelcut_models::timestamp::parse_timestamp;
/// assert_eq!(parse_timestamp("01:30:00").unwrap(), 5400.0);
/// assert_eq!(parse_timestamp("05:30").unwrap(), 330.0);
/// assert_eq!(parse_timestamp("90").unwrap(), 90.0);
/// ```
pub fn parse_timestamp(ts: &str) -> Result<f64, TimestampError> {
    let ts = ts.trim();
    if ts.is_empty() {
        return Err(TimestampError::Empty);
    }

    let parts: Vec<&str> = ts.split(':').collect();
    match parts.as_slice() {
        [secs] => parse_seconds(secs),
        [mins, secs] => {
            let minutes = parse_whole("minutes", mins)?;
            let seconds = parse_seconds(secs)?;
            check_below_sixty("seconds", seconds)?;
            Ok(minutes as f64 * 60.0 + seconds)
        }
        [hours, mins, secs] => {
            let hours = parse_whole("hours", hours)?;
            let minutes = parse_whole("minutes", mins)?;
            if minutes >= 60 {
                return Err(TimestampError::ComponentOutOfRange("minutes", minutes));
            }
            let seconds = parse_seconds(secs)?;
            check_below_sixty("seconds", seconds)?;
            Ok(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds)
        }
        _ => Err(TimestampError::InvalidFormat(ts.to_string())),
    }
}

fn parse_whole(component: &'static str, value: &str) -> Result<u32, TimestampError> {
    if value.starts_with('-') {
        return Err(TimestampError::Negative);
    }
    value
        .parse()
        .map_err(|_| TimestampError::InvalidValue(component, value.to_string()))
}

fn parse_seconds(value: &str) -> Result<f64, TimestampError> {
    let seconds: f64 = value
        .parse()
        .map_err(|_| TimestampError::InvalidValue("seconds", value.to_string()))?;
    if seconds < 0.0 || !seconds.is_finite() {
        return Err(TimestampError::Negative);
    }
    Ok(seconds)
}

fn check_below_sixty(component: &'static str, value: f64) -> Result<(), TimestampError> {
    if value >= 60.0 {
        return Err(TimestampError::ComponentOutOfRange(component, value as u32));
    }
    Ok(())
}

/// Format seconds into `HH:MM:SS`, or `HH:MM:SS.mmm` when a fractional part is present.
pub fn format_seconds(total_secs: f64) -> String {
    let total_secs = total_secs.max(0.0);
    let hours = (total_secs / 3600.0).floor() as u32;
    let mins = ((total_secs % 3600.0) / 60.0).floor() as u32;
    let secs = total_secs % 60.0;

    if (secs - secs.floor()).abs() > 0.0001 {
        format!("{:02}:{:02}:{:06.3}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}:{:02}", hours, mins, secs.floor() as u32)
    }
}

/// Format whole seconds the way people type them: `M:SS`, or `H:MM:SS` past an hour.
pub fn format_compact(total_secs: u32) -> String {
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}
