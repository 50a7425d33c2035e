//! The process-wide clock.
//!
//! At most one global clock is live at a time: `initialize` destroys the
//! previous one before building its replacement. Callbacks running during
//! `initialize` or `shutdown` must not call back into this module's
//! `initialize` or `shutdown`.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::ClockOptions;

use super::VirtualClock;

static SLOT: Mutex<Option<VirtualClock>> = Mutex::new(None);
static LIFECYCLE: Mutex<()> = Mutex::new(());

fn slot() -> MutexGuard<'static, Option<VirtualClock>> {
    SLOT.lock().unwrap_or_else(PoisonError::into_inner)
}

fn lifecycle() -> MutexGuard<'static, ()> {
    LIFECYCLE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Replaces the global clock with one built from `options`.
pub fn initialize(options: ClockOptions) -> VirtualClock {
    let _lifecycle = lifecycle();
    destroy_current();
    let clock = VirtualClock::new(options);
    let displaced = slot().replace(clock.clone());
    if let Some(displaced) = displaced {
        // Only possible if a callback lazily created a clock mid-initialize.
        displaced.destroy();
    }
    clock
}

/// The global clock, created with default options on first use.
pub fn instance() -> VirtualClock {
    let mut slot = slot();
    match slot.as_ref() {
        Some(clock) => clock.clone(),
        None => {
            let clock = VirtualClock::new(ClockOptions::default());
            *slot = Some(clock.clone());
            clock
        }
    }
}

pub fn try_instance() -> Option<VirtualClock> {
    slot().clone()
}

/// Destroys the global clock, if any.
pub fn shutdown() {
    let _lifecycle = lifecycle();
    destroy_current();
}

fn destroy_current() {
    // Take it out first so destroy callbacks can still reach `instance()`.
    loop {
        let current = slot().take();
        match current {
            Some(clock) => clock.destroy(),
            None => break,
        }
    }
}
