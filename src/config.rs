//! Clock configuration, from code, a JSON file or the environment.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use jiff::Timestamp;
use serde::Deserialize;

use crate::environment::Environment;
use crate::errors::Error;
use crate::hijack::{Binding, TimeSurface};
use crate::time::parse_instant;

/// Receives the current virtual instant.
pub type ChangeCallback = Arc<dyn Fn(Timestamp) + Send + Sync>;

/// How the clock decides whether it may be active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "ActivationRepr")]
pub enum ActivationPolicy {
    /// Start enabled, bypassing the environment gate.
    Enabled,
    /// Start disabled; `enable()` still consults the environment gate.
    Disabled,
    /// Start enabled only if the environment allows it.
    #[default]
    Auto,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ActivationRepr {
    Flag(bool),
    Mode(String),
}

impl TryFrom<ActivationRepr> for ActivationPolicy {
    type Error = Error;

    fn try_from(repr: ActivationRepr) -> Result<Self, Self::Error> {
        match repr {
            ActivationRepr::Flag(flag) => Ok(flag.into()),
            ActivationRepr::Mode(mode) => mode.parse(),
        }
    }
}

impl From<bool> for ActivationPolicy {
    fn from(flag: bool) -> Self {
        if flag {
            ActivationPolicy::Enabled
        } else {
            ActivationPolicy::Disabled
        }
    }
}

impl FromStr for ActivationPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "true" | "on" | "enabled" => Ok(ActivationPolicy::Enabled),
            "false" | "off" | "disabled" => Ok(ActivationPolicy::Disabled),
            "auto" => Ok(ActivationPolicy::Auto),
            other => Err(Error::Config(format!(
                "Unknown activation policy '{}'; expected true, false or 'auto'",
                other
            ))),
        }
    }
}

/// Which library integrations are hijacked while the clock is enabled.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "SelectionRepr")]
pub enum LibrarySelection {
    #[default]
    All,
    None,
    /// Exactly these library ids; ids that match no integration are ignored.
    Only(BTreeSet<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SelectionRepr {
    Flag(bool),
    List(Vec<String>),
}

impl From<SelectionRepr> for LibrarySelection {
    fn from(repr: SelectionRepr) -> Self {
        match repr {
            SelectionRepr::Flag(flag) => flag.into(),
            SelectionRepr::List(ids) => LibrarySelection::Only(ids.into_iter().collect()),
        }
    }
}

impl From<bool> for LibrarySelection {
    fn from(flag: bool) -> Self {
        if flag {
            LibrarySelection::All
        } else {
            LibrarySelection::None
        }
    }
}

impl LibrarySelection {
    pub fn includes(&self, library: &str) -> bool {
        match self {
            LibrarySelection::All => true,
            LibrarySelection::None => false,
            LibrarySelection::Only(ids) => ids.contains(library),
        }
    }
}

impl FromStr for LibrarySelection {
    type Err = Error;

    /// `true`/`false`, or a comma separated list of library ids.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "true" => return Ok(LibrarySelection::All),
            "false" | "" => return Ok(LibrarySelection::None),
            _ => {}
        }
        let ids: BTreeSet<String> = s
            .split(',')
            .map(|id| id.trim().to_lowercase())
            .filter(|id| !id.is_empty())
            .collect();
        if ids.is_empty() {
            return Err(Error::Config(format!("Invalid library selection '{}'", s)));
        }
        Ok(LibrarySelection::Only(ids))
    }
}

/// Everything a [`VirtualClock`](crate::VirtualClock) is built from.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClockOptions {
    pub activation: ActivationPolicy,
    /// Starting instant; the real current time when absent.
    pub initial_instant: Option<Timestamp>,
    pub hijack_libraries: LibrarySelection,
    /// Overrides classification; classified from the process when absent.
    pub environment: Option<Environment>,
    #[serde(skip)]
    pub on_change: Option<ChangeCallback>,
    /// Surface to intercept; the process-wide surface when absent.
    #[serde(skip)]
    pub surface: Option<Arc<TimeSurface>>,
    /// Real time source for `reset_to_real_time`; the system clock when absent.
    #[serde(skip)]
    pub wall_clock: Option<Binding>,
}

impl fmt::Debug for ClockOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockOptions")
            .field("activation", &self.activation)
            .field("initial_instant", &self.initial_instant)
            .field("hijack_libraries", &self.hijack_libraries)
            .field("environment", &self.environment)
            .field("on_change", &self.on_change.is_some())
            .field("surface", &self.surface.is_some())
            .field("wall_clock", &self.wall_clock.is_some())
            .finish()
    }
}

impl ClockOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_activation(mut self, activation: impl Into<ActivationPolicy>) -> Self {
        self.activation = activation.into();
        self
    }

    pub fn with_initial_instant(mut self, instant: Timestamp) -> Self {
        self.initial_instant = Some(instant);
        self
    }

    pub fn with_hijack_libraries(mut self, selection: impl Into<LibrarySelection>) -> Self {
        self.hijack_libraries = selection.into();
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn with_on_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(Timestamp) + Send + Sync + 'static,
    {
        self.on_change = Some(Arc::new(callback));
        self
    }

    pub fn with_surface(mut self, surface: Arc<TimeSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn with_wall_clock(mut self, wall_clock: Binding) -> Self {
        self.wall_clock = Some(wall_clock);
        self
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Reads `TIMESHIFT_ACTIVATION`, `TIMESHIFT_INITIAL_INSTANT`,
    /// `TIMESHIFT_HIJACK_LIBRARIES` and `TIMESHIFT_ENV`. Unset variables keep
    /// their defaults.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = ClockOptions::default();
        if let Some(value) = lookup("TIMESHIFT_ACTIVATION") {
            options.activation = value.parse()?;
        }
        if let Some(value) = lookup("TIMESHIFT_INITIAL_INSTANT") {
            options.initial_instant = Some(parse_instant(&value).map_err(|e| {
                Error::Config(format!("Invalid TIMESHIFT_INITIAL_INSTANT: {}", e))
            })?);
        }
        if let Some(value) = lookup("TIMESHIFT_HIJACK_LIBRARIES") {
            options.hijack_libraries = value.parse()?;
        }
        if let Some(value) = lookup("TIMESHIFT_ENV") {
            options.environment = Some(value.parse()?);
        }
        Ok(options)
    }
}

/// A partial update for [`VirtualClock::update_options`](crate::VirtualClock::update_options).
#[derive(Clone, Default)]
pub struct OptionsPatch {
    pub activation: Option<ActivationPolicy>,
    pub initial_instant: Option<Timestamp>,
    pub hijack_libraries: Option<LibrarySelection>,
    /// `Some(None)` returns to auto-classification.
    pub environment: Option<Option<Environment>>,
    /// `Some(None)` clears the callback.
    pub on_change: Option<Option<ChangeCallback>>,
}

impl OptionsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activation(mut self, activation: impl Into<ActivationPolicy>) -> Self {
        self.activation = Some(activation.into());
        self
    }

    pub fn initial_instant(mut self, instant: Timestamp) -> Self {
        self.initial_instant = Some(instant);
        self
    }

    pub fn hijack_libraries(mut self, selection: impl Into<LibrarySelection>) -> Self {
        self.hijack_libraries = Some(selection.into());
        self
    }

    pub fn environment(mut self, environment: Option<Environment>) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn on_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(Timestamp) + Send + Sync + 'static,
    {
        self.on_change = Some(Some(Arc::new(callback)));
        self
    }

    pub fn clear_on_change(mut self) -> Self {
        self.on_change = Some(None);
        self
    }
}
