use std::time::SystemTime;

use jiff::tz::TimeZone;
use jiff::{Timestamp, Zoned, civil};

use crate::errors::Error;

use super::duration_from_millis;

/// Anything `set_time` accepts as "the new now".
#[derive(Clone, Debug)]
pub enum TimeInput {
    Timestamp(Timestamp),
    System(SystemTime),
    Text(String),
    /// Milliseconds since the Unix epoch. Fractional values keep their
    /// sub-millisecond part.
    EpochMillis(f64),
}

impl TimeInput {
    /// Resolves the input to a concrete instant without touching any clock state.
    pub fn resolve(&self) -> Result<Timestamp, Error> {
        match self {
            TimeInput::Timestamp(ts) => Ok(*ts),
            TimeInput::System(time) => Timestamp::try_from(*time)
                .map_err(|e| Error::InvalidTime(format!("system time out of range: {e}"))),
            TimeInput::Text(text) => parse_instant(text),
            TimeInput::EpochMillis(ms) => timestamp_from_millis(*ms),
        }
    }
}

impl From<Timestamp> for TimeInput {
    fn from(ts: Timestamp) -> Self {
        TimeInput::Timestamp(ts)
    }
}

impl From<Zoned> for TimeInput {
    fn from(zoned: Zoned) -> Self {
        TimeInput::Timestamp(zoned.timestamp())
    }
}

impl From<&Zoned> for TimeInput {
    fn from(zoned: &Zoned) -> Self {
        TimeInput::Timestamp(zoned.timestamp())
    }
}

impl From<SystemTime> for TimeInput {
    fn from(time: SystemTime) -> Self {
        TimeInput::System(time)
    }
}

impl From<&str> for TimeInput {
    fn from(text: &str) -> Self {
        TimeInput::Text(text.to_string())
    }
}

impl From<String> for TimeInput {
    fn from(text: String) -> Self {
        TimeInput::Text(text)
    }
}

impl From<f64> for TimeInput {
    fn from(ms: f64) -> Self {
        TimeInput::EpochMillis(ms)
    }
}

impl From<i64> for TimeInput {
    fn from(ms: i64) -> Self {
        TimeInput::EpochMillis(ms as f64)
    }
}

/// Parses a textual instant.
///
/// Accepted, in order: RFC 3339 / ISO 8601 timestamps with an offset, zoned
/// datetimes with a bracketed time zone annotation, civil datetimes and plain
/// dates (read as UTC), RFC 2822 strings, and numeric epoch milliseconds.
pub fn parse_instant(text: &str) -> Result<Timestamp, Error> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::InvalidTime("empty time string".into()));
    }
    if let Ok(ts) = text.parse::<Timestamp>() {
        return Ok(ts);
    }
    if let Ok(zoned) = text.parse::<Zoned>() {
        return Ok(zoned.timestamp());
    }
    if let Ok(dt) = text.parse::<civil::DateTime>() {
        return Ok(dt.to_zoned(TimeZone::UTC)?.timestamp());
    }
    if let Ok(date) = text.parse::<civil::Date>() {
        return Ok(date.to_zoned(TimeZone::UTC)?.timestamp());
    }
    if let Ok(zoned) = jiff::fmt::rfc2822::parse(text) {
        return Ok(zoned.timestamp());
    }
    if let Ok(ms) = text.parse::<f64>() {
        return timestamp_from_millis(ms);
    }
    Err(Error::InvalidTime(format!(
        "'{text}' is not a recognizable date or time"
    )))
}

/// Builds an instant from epoch milliseconds, rejecting NaN, infinities and
/// values outside the representable range.
pub fn timestamp_from_millis(ms: f64) -> Result<Timestamp, Error> {
    if !ms.is_finite() {
        return Err(Error::InvalidTime(format!(
            "{ms} is not a finite epoch millisecond value"
        )));
    }
    let offset = duration_from_millis(ms)
        .map_err(|_| Error::InvalidTime(format!("{ms}ms since epoch is out of range")))?;
    Timestamp::UNIX_EPOCH
        .checked_add(offset)
        .map_err(|e| Error::InvalidTime(format!("{ms}ms since epoch is out of range: {e}")))
}
