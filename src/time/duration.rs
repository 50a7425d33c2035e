use jiff::{SignedDuration, Span, SpanRelativeTo, Timestamp};

use crate::errors::Error;

/// Converts a millisecond count into a `SignedDuration`.
///
/// Whole milliseconds are truncated toward zero and the remainder is rounded
/// half away from zero to nanoseconds, so `duration_from_millis(-x)` is always
/// the exact negation of `duration_from_millis(x)`.
pub fn duration_from_millis(ms: f64) -> Result<SignedDuration, Error> {
    if !ms.is_finite() {
        return Err(Error::InvalidDuration(format!(
            "{ms} is not a finite number of milliseconds"
        )));
    }
    let whole = ms.trunc();
    if whole.abs() >= i64::MAX as f64 {
        return Err(Error::InvalidTime(format!(
            "{ms}ms exceeds the representable range"
        )));
    }
    let nanos = ((ms - whole) * 1_000_000.0).round() as i64;
    SignedDuration::from_millis(whole as i64)
        .checked_add(SignedDuration::from_nanos(nanos))
        .ok_or_else(|| Error::InvalidTime(format!("{ms}ms exceeds the representable range")))
}

/// Parses a human-entered duration.
///
/// Bare numbers are milliseconds. Otherwise jiff's friendly format
/// (`"1h 30m"`, `"2 days"`) and ISO 8601 (`"PT90M"`) are accepted, with days
/// and weeks treated as 24-hour multiples.
pub fn parse_duration(text: &str) -> Result<SignedDuration, Error> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::InvalidDuration("empty duration string".into()));
    }
    if let Ok(ms) = text.parse::<f64>() {
        return duration_from_millis(ms);
    }
    if let Ok(duration) = text.parse::<SignedDuration>() {
        return Ok(duration);
    }
    let span: Span = text
        .parse()
        .map_err(|e| Error::InvalidDuration(format!("'{text}' is not a duration: {e}")))?;
    span.to_duration(SpanRelativeTo::days_are_24_hours())
        .map_err(|e| Error::InvalidDuration(format!("'{text}' has no fixed length: {e}")))
}

/// Renders a duration compactly, e.g. `"-1d 2h 3m 4s"`.
pub fn format_duration(duration: SignedDuration) -> String {
    let abs = duration.unsigned_abs();
    let total = abs.as_secs();
    let units = [
        (total / 86_400, "d"),
        ((total % 86_400) / 3_600, "h"),
        ((total % 3_600) / 60, "m"),
        (total % 60, "s"),
        (u64::from(abs.subsec_millis()), "ms"),
    ];
    let parts: Vec<String> = units
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{value}{unit}"))
        .collect();
    if parts.is_empty() {
        return "0s".to_string();
    }
    let sign = if duration.is_negative() { "-" } else { "" };
    format!("{sign}{}", parts.join(" "))
}

/// Describes how far a virtual instant sits from real time.
pub fn format_offset(virtual_now: Timestamp, real_now: Timestamp) -> String {
    let offset = virtual_now.duration_since(real_now);
    if offset.unsigned_abs().as_secs() == 0 {
        return "in sync".to_string();
    }
    let magnitude = format_duration(offset.abs());
    if offset.is_negative() {
        format!("{magnitude} behind")
    } else {
        format!("{magnitude} ahead")
    }
}
