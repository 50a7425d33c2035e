use std::sync::Arc;

use jiff::Timestamp;

use super::surface::{Binding, TimeSource};

/// The controller as seen from an installed shim.
pub trait ClockProbe: Send + Sync {
    /// The virtual instant while the clock is enabled, `None` otherwise.
    fn active_instant(&self) -> Option<Timestamp>;
}

/// Redirects "now" to the probe while it reports an active instant and falls
/// through to the captured original otherwise.
pub struct Shim {
    original: Binding,
    probe: Arc<dyn ClockProbe>,
}

impl Shim {
    pub fn new(original: Binding, probe: Arc<dyn ClockProbe>) -> Self {
        Self { original, probe }
    }
}

impl TimeSource for Shim {
    fn now(&self) -> Timestamp {
        match self.probe.active_instant() {
            Some(instant) => instant,
            None => self.original.now(),
        }
    }

    fn is_redirect(&self) -> bool {
        true
    }
}
