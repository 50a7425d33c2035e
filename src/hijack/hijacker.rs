use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::LibrarySelection;
use crate::integrations::{INTEGRATIONS, LibraryIntegration, known_library};

use super::shim::{ClockProbe, Shim};
use super::surface::{Binding, LibraryId, TimeSource, TimeSurface};

/// The native binding captured at install time. Present only while the native
/// surface is redirected.
struct InterceptionBackup {
    original: Binding,
    shim: Binding,
}

/// What a library integration replaced. Present only while installed.
pub struct LibraryHijackRecord {
    pub library: LibraryId,
    original: Option<Binding>,
}

/// Installs and removes "now" shims on a [`TimeSurface`].
///
/// Every operation is idempotent: installing twice captures the pristine
/// binding once, and restoring when nothing is installed does nothing.
pub struct Hijacker {
    surface: Arc<TimeSurface>,
    integrations: &'static [&'static dyn LibraryIntegration],
    backup: Option<InterceptionBackup>,
    records: BTreeMap<LibraryId, LibraryHijackRecord>,
}

impl Hijacker {
    pub fn new(surface: Arc<TimeSurface>) -> Self {
        Self::with_integrations(surface, INTEGRATIONS)
    }

    pub fn with_integrations(
        surface: Arc<TimeSurface>,
        integrations: &'static [&'static dyn LibraryIntegration],
    ) -> Self {
        Self {
            surface,
            integrations,
            backup: None,
            records: BTreeMap::new(),
        }
    }

    pub fn surface(&self) -> &Arc<TimeSurface> {
        &self.surface
    }

    pub fn is_native_installed(&self) -> bool {
        self.backup.is_some()
    }

    pub fn installed_libraries(&self) -> Vec<LibraryId> {
        self.records.keys().copied().collect()
    }

    /// Returns `true` if a shim was installed by this call.
    pub fn install_native(&mut self, probe: Arc<dyn ClockProbe>) -> bool {
        if self.backup.is_some() {
            return false;
        }
        let original = self.surface.native_binding();
        if original.is_redirect() {
            warn!(
                target_surface = "native",
                "hijack.layered: native binding is already redirected by another clock"
            );
        }
        let shim: Binding = Arc::new(Shim::new(Arc::clone(&original), probe));
        self.surface.replace_native(Arc::clone(&shim));
        self.backup = Some(InterceptionBackup { original, shim });
        debug!(target_surface = "native", "hijack.installed");
        true
    }

    /// Returns `true` if a shim was removed by this call.
    pub fn restore_native(&mut self) -> bool {
        let Some(backup) = self.backup.take() else {
            return false;
        };
        if !self.surface.restore_native(&backup.shim, backup.original) {
            // Another shim sits on top of ours. Ours falls through once the
            // clock is inactive, so the chain stays transparent.
            warn!(
                target_surface = "native",
                "native binding was layered over while hijacked; leaving it in place"
            );
            return true;
        }
        debug!(target_surface = "native", "hijack.restored");
        true
    }

    /// Installs every selected, detected integration that is not already
    /// installed. Returns the libraries installed by this call.
    pub fn install_libraries(
        &mut self,
        probe: Arc<dyn ClockProbe>,
        selection: &LibrarySelection,
    ) -> Vec<LibraryId> {
        if let LibrarySelection::Only(ids) = selection {
            for id in ids.iter().filter(|id| !known_library(id)) {
                debug!(library = %id, "hijack.unknown_library");
            }
        }
        let mut installed = Vec::new();
        for integration in self.integrations {
            let id = integration.id();
            if !selection.includes(id) || self.records.contains_key(id) {
                continue;
            }
            if !integration.detect() {
                debug!(library = id, "hijack.library_absent");
                continue;
            }
            match integration.install(&self.surface, Arc::clone(&probe)) {
                Ok(original) => {
                    self.records
                        .insert(id, LibraryHijackRecord { library: id, original });
                    debug!(target_surface = id, "hijack.installed");
                    installed.push(id);
                }
                Err(err) => {
                    warn!(library = id, error = %err, "hijack.library_failed");
                }
            }
        }
        installed
    }

    pub fn restore_libraries(&mut self) -> Vec<LibraryId> {
        let ids = self.installed_libraries();
        for &id in &ids {
            self.restore_library(id);
        }
        ids
    }

    /// Brings installed libraries in line with `selection`: deselected ones
    /// are restored, newly selected ones installed, the rest left alone.
    pub fn reconcile_libraries(
        &mut self,
        probe: Arc<dyn ClockProbe>,
        selection: &LibrarySelection,
    ) {
        let deselected: Vec<LibraryId> = self
            .records
            .keys()
            .copied()
            .filter(|id| !selection.includes(id))
            .collect();
        for id in deselected {
            self.restore_library(id);
        }
        self.install_libraries(probe, selection);
    }

    /// Restores everything and drops all records. Safe from any state.
    pub fn destroy(&mut self) {
        self.restore_native();
        self.restore_libraries();
        self.records.clear();
    }

    fn restore_library(&mut self, id: LibraryId) {
        let Some(record) = self.records.remove(id) else {
            return;
        };
        match self.integrations.iter().find(|i| i.id() == id) {
            Some(integration) => integration.restore(&self.surface, record.original),
            // Integration list is static, so this only happens if a record was
            // created from a different list. Put the slot back directly.
            None => {
                self.surface.replace_library(id, record.original);
            }
        }
        debug!(target_surface = record.library, "hijack.restored");
    }
}

impl Drop for Hijacker {
    fn drop(&mut self) {
        self.destroy();
    }
}
