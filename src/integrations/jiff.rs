//! `jiff` facade. Use these in place of `Timestamp::now()` / `Zoned::now()`.

use jiff::tz::TimeZone;
use jiff::{Timestamp, Zoned};

use crate::hijack::TimeSurface;

use super::JIFF;

pub fn now() -> Timestamp {
    TimeSurface::global().library_now(JIFF)
}

pub fn now_zoned() -> Zoned {
    now().to_zoned(TimeZone::system())
}

pub fn now_in(tz: TimeZone) -> Zoned {
    now().to_zoned(tz)
}
