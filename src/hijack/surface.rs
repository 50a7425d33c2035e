use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use std::time::SystemTime;

use jiff::tz::TimeZone;
use jiff::{Timestamp, Zoned};

/// Identifies a third-party library integration (e.g. `"jiff"`).
pub type LibraryId = &'static str;

/// Something that can answer "what time is it now".
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Timestamp;

    /// Whether this source redirects "now" on behalf of a clock.
    fn is_redirect(&self) -> bool {
        false
    }
}

/// The real wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemSource;

impl TimeSource for SystemSource {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A replaceable "now" implementation.
pub type Binding = Arc<dyn TimeSource>;

/// The interposition point for "now".
///
/// Application code asks the surface for the current instant instead of
/// calling `SystemTime::now()` directly. The surface holds one native binding
/// plus an optional binding per library integration; the hijacker swaps these
/// bindings in and out. Only the zero-argument "now" call shape ever goes
/// through a binding.
///
/// Keep at most one enabled clock per surface. A second clock layers its shim
/// over the first; both still fall through to real time once disabled, but the
/// lower shim stays in the chain.
pub struct TimeSurface {
    native: RwLock<Binding>,
    libraries: RwLock<BTreeMap<LibraryId, Binding>>,
}

impl TimeSurface {
    pub fn new() -> Self {
        Self::with_native(Arc::new(SystemSource))
    }

    pub fn with_native(binding: Binding) -> Self {
        Self {
            native: RwLock::new(binding),
            libraries: RwLock::new(BTreeMap::new()),
        }
    }

    /// The process-wide surface used by the crate-level `now()` functions.
    pub fn global() -> Arc<TimeSurface> {
        static GLOBAL: OnceLock<Arc<TimeSurface>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(TimeSurface::new())))
    }

    pub fn now(&self) -> Timestamp {
        // Clone the binding out first so the lock is not held while it runs.
        let binding = self.native_binding();
        binding.now()
    }

    pub fn system_now(&self) -> SystemTime {
        SystemTime::from(self.now())
    }

    pub fn now_zoned(&self) -> Zoned {
        self.now().to_zoned(TimeZone::system())
    }

    /// "Now" as seen by a library integration. Libraries without an installed
    /// binding read the real clock.
    pub fn library_now(&self, library: LibraryId) -> Timestamp {
        match self.library_binding(library) {
            Some(binding) => binding.now(),
            None => Timestamp::now(),
        }
    }

    pub fn native_binding(&self) -> Binding {
        Arc::clone(&*self.native.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn library_binding(&self, library: LibraryId) -> Option<Binding> {
        self.libraries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(library)
            .cloned()
    }

    /// Installs `binding` as the native "now" and returns the previous one.
    pub(crate) fn replace_native(&self, binding: Binding) -> Binding {
        let mut native = self.native.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *native, binding)
    }

    /// Puts `original` back only if `expected` is still the installed binding.
    pub(crate) fn restore_native(&self, expected: &Binding, original: Binding) -> bool {
        let mut native = self.native.write().unwrap_or_else(PoisonError::into_inner);
        if Arc::ptr_eq(&*native, expected) {
            *native = original;
            true
        } else {
            false
        }
    }

    /// Sets (or with `None`, clears) a library binding, returning the previous one.
    pub fn replace_library(&self, library: LibraryId, binding: Option<Binding>) -> Option<Binding> {
        let mut libraries = self
            .libraries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match binding {
            Some(binding) => libraries.insert(library, binding),
            None => libraries.remove(library),
        }
    }

    pub fn library_bindings(&self) -> Vec<LibraryId> {
        self.libraries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }
}

impl Default for TimeSurface {
    fn default() -> Self {
        Self::new()
    }
}
