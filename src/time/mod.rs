mod duration;
mod parse;

pub use duration::{duration_from_millis, format_duration, format_offset, parse_duration};
pub use parse::{TimeInput, parse_instant, timestamp_from_millis};
