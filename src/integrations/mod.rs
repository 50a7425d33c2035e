//! Third-party date library integrations.
//!
//! Each entry in [`INTEGRATIONS`] knows how to detect its library and how to
//! swap the library's "now" binding on a [`TimeSurface`]. The hijacker walks
//! the list in order; an absent or failing entry never affects the others.

use std::sync::Arc;

use crate::errors::Error;
use crate::hijack::{Binding, ClockProbe, LibraryId, Shim, SystemSource, TimeSurface};

#[cfg(feature = "chrono")]
pub mod chrono;
pub mod jiff;

pub trait LibraryIntegration: Send + Sync {
    fn id(&self) -> LibraryId;

    /// Whether the library is present in this build.
    fn detect(&self) -> bool;

    /// Redirects the library's zero-argument "now" through `probe` and returns
    /// the binding that was in place before.
    fn install(
        &self,
        surface: &TimeSurface,
        probe: Arc<dyn ClockProbe>,
    ) -> Result<Option<Binding>, Error>;

    /// Puts back exactly what `install` returned.
    fn restore(&self, surface: &TimeSurface, original: Option<Binding>);
}

/// An integration whose library reads "now" from a named surface slot.
pub struct SlotIntegration {
    id: LibraryId,
    detect: fn() -> bool,
}

impl SlotIntegration {
    pub const fn new(id: LibraryId, detect: fn() -> bool) -> Self {
        Self { id, detect }
    }
}

impl LibraryIntegration for SlotIntegration {
    fn id(&self) -> LibraryId {
        self.id
    }

    fn detect(&self) -> bool {
        (self.detect)()
    }

    fn install(
        &self,
        surface: &TimeSurface,
        probe: Arc<dyn ClockProbe>,
    ) -> Result<Option<Binding>, Error> {
        let fallback: Binding = surface
            .library_binding(self.id)
            .unwrap_or_else(|| Arc::new(SystemSource));
        let shim: Binding = Arc::new(Shim::new(fallback, probe));
        Ok(surface.replace_library(self.id, Some(shim)))
    }

    fn restore(&self, surface: &TimeSurface, original: Option<Binding>) {
        surface.replace_library(self.id, original);
    }
}

fn always_linked() -> bool {
    true
}

fn chrono_linked() -> bool {
    cfg!(feature = "chrono")
}

pub const JIFF: LibraryId = "jiff";
pub const CHRONO: LibraryId = "chrono";

static JIFF_INTEGRATION: SlotIntegration = SlotIntegration::new(JIFF, always_linked);
static CHRONO_INTEGRATION: SlotIntegration = SlotIntegration::new(CHRONO, chrono_linked);

/// Every supported integration, in installation order.
pub static INTEGRATIONS: &[&dyn LibraryIntegration] = &[&JIFF_INTEGRATION, &CHRONO_INTEGRATION];

pub fn known_library(id: &str) -> bool {
    INTEGRATIONS.iter().any(|integration| integration.id() == id)
}
