use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use jiff::{SignedDuration, Timestamp};

use crate::config::{ActivationPolicy, ChangeCallback, ClockOptions, OptionsPatch};
use crate::environment::{Environment, classify, is_activation_allowed};
use crate::errors::Error;
use crate::hijack::{Binding, ClockProbe, Hijacker, LibraryId, SystemSource, TimeSource, TimeSurface};
use crate::telemetry::clock::{ChangeReason, ClockTelemetry};
use crate::time::{TimeInput, duration_from_millis, parse_duration};

use super::subscribers::{SubscriberSet, Subscription, Target, deliver};

pub const MILLIS_PER_MINUTE: f64 = 60_000.0;
pub const MILLIS_PER_HOUR: f64 = 3_600_000.0;
pub const MILLIS_PER_DAY: f64 = 86_400_000.0;

pub(crate) struct ClockState {
    instant: Timestamp,
    active: bool,
    destroyed: bool,
    options: ClockOptions,
    environment: Environment,
    wall_clock: Binding,
    pub(crate) subscribers: SubscriberSet,
    hijacker: Hijacker,
}

impl ClockState {
    fn activation_permitted(&self) -> bool {
        self.options.activation == ActivationPolicy::Enabled
            || is_activation_allowed(self.environment)
    }

    fn targets(&self, include_on_change: bool) -> Vec<Target> {
        let mut targets = self.subscribers.snapshot();
        if include_on_change && let Some(callback) = &self.options.on_change {
            targets.push(Target {
                label: "on_change".to_string(),
                callback: callback.clone(),
            });
        }
        targets
    }
}

pub(crate) struct Shared {
    state: Mutex<ClockState>,
    /// The instant shims answer with, `None` while inactive. Written only
    /// with `state` held; read without it so a shim never waits on `state`.
    published: RwLock<Option<Timestamp>>,
    telemetry: ClockTelemetry,
}

impl Shared {
    pub(crate) fn lock(&self) -> MutexGuard<'_, ClockState> {
        // Mutations validate before they write, so a poisoned state is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &ClockState) {
        let mut published = self
            .published
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *published = state.active.then_some(state.instant);
    }

    fn published(&self) -> Option<Timestamp> {
        *self
            .published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// What installed shims consult. Holds the clock weakly so an abandoned shim
/// simply falls through to real time.
struct Probe(Weak<Shared>);

impl ClockProbe for Probe {
    fn active_instant(&self) -> Option<Timestamp> {
        self.0.upgrade()?.published()
    }
}

/// Handle to a virtual clock. Clones share the same clock.
#[derive(Clone)]
pub struct VirtualClock {
    shared: Arc<Shared>,
}

impl VirtualClock {
    pub fn new(options: ClockOptions) -> Self {
        let environment = options.environment.unwrap_or_else(classify);
        let wall_clock = options
            .wall_clock
            .clone()
            .unwrap_or_else(|| Arc::new(SystemSource));
        let surface = options.surface.clone().unwrap_or_else(TimeSurface::global);
        let instant = options.initial_instant.unwrap_or_else(|| wall_clock.now());
        let start_active = match options.activation {
            ActivationPolicy::Enabled => true,
            ActivationPolicy::Disabled => false,
            ActivationPolicy::Auto => is_activation_allowed(environment),
        };
        let telemetry = ClockTelemetry::new();
        if start_active
            && options.activation == ActivationPolicy::Enabled
            && environment == Environment::Production
        {
            telemetry.emit_forced_in_production();
        }

        let clock = VirtualClock {
            shared: Arc::new(Shared {
                state: Mutex::new(ClockState {
                    instant,
                    active: false,
                    destroyed: false,
                    options,
                    environment,
                    wall_clock,
                    subscribers: SubscriberSet::default(),
                    hijacker: Hijacker::new(surface),
                }),
                published: RwLock::new(None),
                telemetry,
            }),
        };
        if start_active {
            let mut state = clock.shared.lock();
            clock.activate(&mut state);
        }
        clock
            .shared
            .telemetry
            .emit_created(environment, start_active, instant);
        clock
    }

    pub fn current_time(&self) -> Timestamp {
        self.shared.lock().instant
    }

    pub fn is_active(&self) -> bool {
        self.shared.lock().active
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.lock().destroyed
    }

    pub fn environment(&self) -> Environment {
        self.shared.lock().environment
    }

    pub fn options(&self) -> ClockOptions {
        self.shared.lock().options.clone()
    }

    pub fn surface(&self) -> Arc<TimeSurface> {
        Arc::clone(self.shared.lock().hijacker.surface())
    }

    pub fn hijacked_libraries(&self) -> Vec<LibraryId> {
        self.shared.lock().hijacker.installed_libraries()
    }

    pub fn is_native_hijacked(&self) -> bool {
        self.shared.lock().hijacker.is_native_installed()
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.lock().subscribers.len()
    }

    pub fn instance_id(&self) -> uuid::Uuid {
        self.shared.telemetry.instance_id()
    }

    /// Jumps to `value`. Nothing changes if it does not resolve to an instant.
    pub fn set_time(&self, value: impl Into<TimeInput>) -> Result<Timestamp, Error> {
        let target = value.into().resolve()?;
        self.commit(ChangeReason::Set, |_| Ok(target))
    }

    /// Moves the clock by `millis`; negative values move it back.
    pub fn add_time(&self, millis: f64) -> Result<Timestamp, Error> {
        let delta = duration_from_millis(millis)?;
        self.add_duration(delta)
    }

    pub fn add_minutes(&self, minutes: f64) -> Result<Timestamp, Error> {
        self.add_time(minutes * MILLIS_PER_MINUTE)
    }

    pub fn add_hours(&self, hours: f64) -> Result<Timestamp, Error> {
        self.add_time(hours * MILLIS_PER_HOUR)
    }

    pub fn add_days(&self, days: f64) -> Result<Timestamp, Error> {
        self.add_time(days * MILLIS_PER_DAY)
    }

    pub fn add_duration(&self, delta: SignedDuration) -> Result<Timestamp, Error> {
        self.commit(ChangeReason::Advanced, |from| {
            from.checked_add(delta).map_err(|e| {
                Error::InvalidTime(format!("{from} moved by {delta} is out of range: {e}"))
            })
        })
    }

    /// Moves the clock by a textual duration such as `"1h 30m"` or `"-2 days"`.
    pub fn advance_by(&self, text: &str) -> Result<Timestamp, Error> {
        let delta = parse_duration(text)?;
        self.add_duration(delta)
    }

    pub fn reset_to_real_time(&self) -> Result<Timestamp, Error> {
        // Read the wall clock outside the lock: it may itself be a surface binding.
        let wall_clock = Arc::clone(&self.shared.lock().wall_clock);
        let now = wall_clock.now();
        self.commit(ChangeReason::Reset, |_| Ok(now))
    }

    /// How far the virtual instant is from the wall clock.
    pub fn offset_from_real_time(&self) -> SignedDuration {
        let (instant, wall_clock) = {
            let state = self.shared.lock();
            (state.instant, Arc::clone(&state.wall_clock))
        };
        instant.duration_since(wall_clock.now())
    }

    /// Turns virtual time on. Returns whether the clock is active afterwards;
    /// `false` means the environment policy refused.
    pub fn enable(&self) -> bool {
        let outcome = {
            let mut state = self.shared.lock();
            if state.active {
                return true;
            }
            if state.destroyed {
                Err(None)
            } else if !state.activation_permitted() {
                Err(Some(state.environment))
            } else {
                self.activate(&mut state);
                Ok((state.targets(false), state.instant))
            }
        };
        match outcome {
            Ok((targets, instant)) => {
                deliver(&self.shared.telemetry, targets, instant);
                true
            }
            Err(None) => {
                self.shared.telemetry.emit_enable_after_destroy();
                false
            }
            Err(Some(environment)) => {
                self.shared.telemetry.emit_policy_denied(environment);
                false
            }
        }
    }

    pub fn disable(&self) {
        let (targets, instant) = {
            let mut state = self.shared.lock();
            if !state.active {
                return;
            }
            state.active = false;
            self.shared.publish(&state);
            state.hijacker.restore_native();
            state.hijacker.restore_libraries();
            self.shared
                .telemetry
                .emit_activation(false, state.environment);
            (state.targets(false), state.instant)
        };
        deliver(&self.shared.telemetry, targets, instant);
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Timestamp) + Send + Sync + 'static,
    {
        self.subscribe_callback(Arc::new(callback))
    }

    pub fn subscribe_callback(&self, callback: ChangeCallback) -> Subscription {
        let id = self.shared.lock().subscribers.insert(callback);
        Subscription::new(id, Arc::downgrade(&self.shared))
    }

    /// Merges `patch` into the options. A changed library selection takes
    /// effect immediately while enabled; a new `on_change` is called once with
    /// the current instant.
    pub fn update_options(&self, patch: OptionsPatch) {
        let (catch_up, instant) = {
            let mut state = self.shared.lock();
            if let Some(activation) = patch.activation {
                state.options.activation = activation;
            }
            if let Some(instant) = patch.initial_instant {
                state.options.initial_instant = Some(instant);
            }
            if let Some(environment) = patch.environment {
                state.options.environment = environment;
                state.environment = environment.unwrap_or_else(classify);
            }
            if let Some(selection) = patch.hijack_libraries
                && selection != state.options.hijack_libraries
            {
                state.options.hijack_libraries = selection;
                if state.active {
                    let probe = self.probe();
                    let selection = state.options.hijack_libraries.clone();
                    state.hijacker.reconcile_libraries(probe, &selection);
                }
            }
            let catch_up = match patch.on_change {
                Some(callback) => {
                    state.options.on_change = callback.clone();
                    callback
                }
                None => None,
            };
            (catch_up, state.instant)
        };
        if let Some(callback) = catch_up {
            let target = Target {
                label: "on_change".to_string(),
                callback,
            };
            deliver(&self.shared.telemetry, vec![target], instant);
        }
    }

    /// Disables, restores every shim and drops all subscribers and the
    /// `on_change` callback. Repeat calls do nothing.
    pub fn destroy(&self) {
        if self.is_destroyed() {
            return;
        }
        self.disable();
        {
            let mut state = self.shared.lock();
            if state.destroyed {
                return;
            }
            state.hijacker.destroy();
            state.subscribers.clear();
            state.options.on_change = None;
            state.destroyed = true;
        }
        self.shared.telemetry.emit_destroyed();
    }

    fn probe(&self) -> Arc<dyn ClockProbe> {
        Arc::new(Probe(Arc::downgrade(&self.shared)))
    }

    fn activate(&self, state: &mut ClockState) {
        state.active = true;
        self.shared.publish(state);
        let probe = self.probe();
        state.hijacker.install_native(Arc::clone(&probe));
        let selection = state.options.hijack_libraries.clone();
        state.hijacker.install_libraries(probe, &selection);
        self.shared.telemetry.emit_activation(true, state.environment);
    }

    /// Validate-then-apply: `next` sees the current instant and either yields
    /// the new one or fails without touching state. Subscribers and
    /// `on_change` run after the lock is released.
    fn commit<F>(&self, reason: ChangeReason, next: F) -> Result<Timestamp, Error>
    where
        F: FnOnce(Timestamp) -> Result<Timestamp, Error>,
    {
        let (from, to, targets) = {
            let mut state = self.shared.lock();
            let from = state.instant;
            let to = next(from)?;
            state.instant = to;
            self.shared.publish(&state);
            (from, to, state.targets(true))
        };
        self.shared.telemetry.emit_time_changed(reason, from, to);
        deliver(&self.shared.telemetry, targets, to);
        Ok(to)
    }
}

impl TimeSource for VirtualClock {
    fn now(&self) -> Timestamp {
        self.current_time()
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new(ClockOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn noon() -> Timestamp {
        "2024-01-01T12:00:00Z".parse().unwrap()
    }

    fn options() -> ClockOptions {
        ClockOptions::new()
            .with_surface(Arc::new(TimeSurface::new()))
            .with_environment(Environment::Test)
            .with_initial_instant(noon())
    }

    #[test]
    fn auto_policy_starts_enabled_outside_production() {
        let clock = VirtualClock::new(options());
        assert!(clock.is_active());
        assert!(clock.is_native_hijacked());
        assert_eq!(clock.surface().now(), noon());
    }

    #[test]
    fn auto_policy_starts_disabled_in_production() {
        let clock = VirtualClock::new(options().with_environment(Environment::Production));
        assert!(!clock.is_active());
        assert!(!clock.is_native_hijacked());
        assert!(!clock.enable());
        assert!(!clock.is_active());
    }

    #[test]
    fn forced_activation_bypasses_gate() {
        let clock = VirtualClock::new(
            options()
                .with_environment(Environment::Production)
                .with_activation(true),
        );
        assert!(clock.is_active());
    }

    #[test]
    fn explicit_false_starts_disabled_but_can_enable() {
        let clock = VirtualClock::new(options().with_activation(false));
        assert!(!clock.is_active());
        assert!(clock.enable());
        assert!(clock.enable());
        assert!(clock.is_active());
    }

    #[test]
    fn failed_mutations_leave_state_alone() {
        let clock = VirtualClock::new(options());
        assert!(matches!(clock.set_time("nope"), Err(Error::InvalidTime(_))));
        assert!(matches!(
            clock.add_time(f64::NAN),
            Err(Error::InvalidDuration(_))
        ));
        assert!(matches!(
            clock.add_days(1e12),
            Err(Error::InvalidTime(_))
        ));
        assert_eq!(clock.current_time(), noon());
    }

    #[test]
    fn advance_by_parses_text() {
        let clock = VirtualClock::new(options());
        clock.advance_by("1h 30m").unwrap();
        assert_eq!(
            clock.current_time(),
            noon().checked_add(SignedDuration::from_mins(90)).unwrap()
        );
    }

    #[test]
    fn reset_uses_wall_clock() {
        struct Frozen;
        impl TimeSource for Frozen {
            fn now(&self) -> Timestamp {
                Timestamp::UNIX_EPOCH
            }
        }
        let clock = VirtualClock::new(options().with_wall_clock(Arc::new(Frozen)));
        clock.reset_to_real_time().unwrap();
        assert_eq!(clock.current_time(), Timestamp::UNIX_EPOCH);
        assert_eq!(clock.offset_from_real_time(), SignedDuration::ZERO);
    }

    #[test]
    fn activation_changes_notify_subscribers_but_not_on_change() {
        let subscriber_hits = Arc::new(AtomicUsize::new(0));
        let on_change_hits = Arc::new(AtomicUsize::new(0));
        let on_change_counter = on_change_hits.clone();
        let clock = VirtualClock::new(
            options().with_on_change(move |_| {
                on_change_counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let counter = subscriber_hits.clone();
        let _sub = clock.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        clock.disable();
        clock.enable();
        assert_eq!(subscriber_hits.load(Ordering::SeqCst), 2);
        assert_eq!(on_change_hits.load(Ordering::SeqCst), 0);

        clock.add_minutes(1.0).unwrap();
        assert_eq!(subscriber_hits.load(Ordering::SeqCst), 3);
        assert_eq!(on_change_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscriber_may_unsubscribe_itself() {
        let clock = VirtualClock::new(options());
        let hits = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let sub = {
            let hits = hits.clone();
            let slot = slot.clone();
            clock.subscribe(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
                if let Some(sub) = slot.lock().unwrap().as_ref() {
                    sub.unsubscribe();
                }
            })
        };
        *slot.lock().unwrap() = Some(sub);

        clock.add_minutes(1.0).unwrap();
        clock.add_minutes(1.0).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(clock.subscriber_count(), 0);
    }

    #[test]
    fn subscriber_may_read_the_surface() {
        let clock = VirtualClock::new(options());
        let seen = Arc::new(Mutex::new(None));
        let surface = clock.surface();
        let _sub = {
            let seen = seen.clone();
            clock.subscribe(move |_| {
                *seen.lock().unwrap() = Some(surface.now());
            })
        };
        let target = clock.add_hours(1.0).unwrap();
        assert_eq!(*seen.lock().unwrap(), Some(target));
    }

    #[test]
    fn destroy_is_idempotent_and_final() {
        let surface = Arc::new(TimeSurface::new());
        let pristine = surface.native_binding();
        let clock = VirtualClock::new(options().with_surface(surface.clone()));
        let _sub = clock.subscribe(|_| {});
        clock.destroy();
        clock.destroy();
        assert!(clock.is_destroyed());
        assert!(!clock.is_active());
        assert_eq!(clock.subscriber_count(), 0);
        assert!(Arc::ptr_eq(&pristine, &surface.native_binding()));
        assert!(!clock.enable());
    }

    #[test]
    fn destroyed_clock_no_longer_calls_on_change() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let clock = VirtualClock::new(options().with_on_change(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        clock.add_minutes(1.0).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        clock.destroy();
        assert!(clock.options().on_change.is_none());
        clock.set_time(noon()).unwrap();
        assert_eq!(clock.current_time(), noon());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_last_handle_restores_surface() {
        let surface = Arc::new(TimeSurface::new());
        let pristine = surface.native_binding();
        {
            let clock = VirtualClock::new(options().with_surface(surface.clone()));
            assert!(clock.is_native_hijacked());
        }
        assert!(Arc::ptr_eq(&pristine, &surface.native_binding()));
    }
}
