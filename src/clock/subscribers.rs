use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Weak;

use jiff::Timestamp;

use crate::config::ChangeCallback;
use crate::telemetry::clock::ClockTelemetry;

use super::controller::Shared;

/// Registered change callbacks keyed by subscription id.
#[derive(Default)]
pub(crate) struct SubscriberSet {
    next_id: u64,
    entries: BTreeMap<u64, ChangeCallback>,
}

impl SubscriberSet {
    pub(crate) fn insert(&mut self, callback: ChangeCallback) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, callback);
        id
    }

    pub(crate) fn remove(&mut self, id: u64) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Copies the current membership for one notification round.
    pub(crate) fn snapshot(&self) -> Vec<Target> {
        self.entries
            .iter()
            .map(|(id, callback)| Target {
                label: format!("subscriber#{id}"),
                callback: callback.clone(),
            })
            .collect()
    }
}

pub(crate) struct Target {
    pub(crate) label: String,
    pub(crate) callback: ChangeCallback,
}

/// Runs every target with `instant`. A panicking callback is logged and the
/// round carries on with the next one.
pub(crate) fn deliver(telemetry: &ClockTelemetry, targets: Vec<Target>, instant: Timestamp) {
    for target in targets {
        let callback = &target.callback;
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(instant))) {
            telemetry.emit_subscriber_failure(&target.label, &panic_message(payload.as_ref()));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Handle returned by [`VirtualClock::subscribe`](crate::VirtualClock::subscribe).
///
/// Dropping it does not unsubscribe; call [`Subscription::unsubscribe`].
#[must_use = "keep the subscription to be able to unsubscribe later"]
pub struct Subscription {
    id: u64,
    shared: Weak<Shared>,
}

impl Subscription {
    pub(crate) fn new(id: u64, shared: Weak<Shared>) -> Self {
        Self { id, shared }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Removes this registration. Later calls do nothing, as does calling it
    /// after the clock is gone.
    pub fn unsubscribe(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.lock().subscribers.remove(self.id);
        }
    }
}
