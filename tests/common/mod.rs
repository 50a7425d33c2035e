#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use jiff::Timestamp;
use timeshift::{ClockOptions, Environment, TimeSource, TimeSurface};

/// Serializes tests that touch the process-wide surface or global clock.
pub fn global_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

pub fn instant(text: &str) -> Timestamp {
    text.parse().expect("valid RFC 3339 instant")
}

pub fn noon() -> Timestamp {
    instant("2024-01-01T12:00:00Z")
}

pub fn isolated(environment: Environment) -> (Arc<TimeSurface>, ClockOptions) {
    let surface = Arc::new(TimeSurface::new());
    let options = ClockOptions::new()
        .with_surface(surface.clone())
        .with_environment(environment)
        .with_initial_instant(noon());
    (surface, options)
}

/// A "now" that never moves, so pass-through reads can be compared exactly.
pub struct Fixed(pub Timestamp);

impl TimeSource for Fixed {
    fn now(&self) -> Timestamp {
        self.0
    }
}

/// A surface whose native "now" is `native` and whose jiff slot already
/// holds `library`.
pub fn fixed_surface(native: Timestamp, library: Timestamp) -> Arc<TimeSurface> {
    let surface = Arc::new(TimeSurface::with_native(Arc::new(Fixed(native))));
    surface.replace_library(timeshift::integrations::JIFF, Some(Arc::new(Fixed(library))));
    surface
}
