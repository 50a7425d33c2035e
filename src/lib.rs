//! A controllable "current time" for testing and demonstrating time-dependent
//! logic.
//!
//! A [`VirtualClock`] owns a virtual instant. While it is enabled, every
//! zero-argument "now" read through a [`TimeSurface`] (the crate-level
//! [`now`], [`system_now`] and [`now_zoned`] functions, plus the library
//! facades in [`integrations`]) returns the virtual instant instead of the
//! real one. Disabled or destroyed clocks leave those reads untouched.

pub mod clock;
pub mod config;
pub mod environment;
pub mod errors;
pub mod hijack;
pub mod integrations;
pub mod telemetry;
pub mod time;


use std::time::SystemTime;

use jiff::{Timestamp, Zoned};

pub use clock::{Subscription, VirtualClock, global};
pub use config::{ActivationPolicy, ChangeCallback, ClockOptions, LibrarySelection, OptionsPatch};
pub use environment::{Environment, classify, is_activation_allowed};
pub use errors::Error;
pub use hijack::{TimeSource, TimeSurface};
pub use time::TimeInput;

/// The current instant as seen through the process-wide surface.
pub fn now() -> Timestamp {
    TimeSurface::global().now()
}

pub fn system_now() -> SystemTime {
    TimeSurface::global().system_now()
}

pub fn now_zoned() -> Zoned {
    TimeSurface::global().now_zoned()
}
