//! `chrono` facade, available with the `chrono` feature. Use these in place of
//! `Utc::now()` / `Local::now()`.

use std::time::SystemTime;

use chrono::{DateTime, Local, Utc};

use crate::hijack::TimeSurface;

use super::CHRONO;

pub fn now_utc() -> DateTime<Utc> {
    DateTime::<Utc>::from(SystemTime::from(TimeSurface::global().library_now(CHRONO)))
}

pub fn now_local() -> DateTime<Local> {
    DateTime::<Local>::from(SystemTime::from(TimeSurface::global().library_now(CHRONO)))
}
