use jiff::Timestamp;
use tracing::{Level, event};
use uuid::Uuid;

use crate::environment::Environment;

/// Why the instant moved.
#[derive(Clone, Copy, Debug)]
pub enum ChangeReason {
    Set,
    Advanced,
    Reset,
}

/// Structured events for one controller instance. The instance id lets logs
/// tell a re-initialized clock apart from its predecessor.
#[derive(Clone, Debug)]
pub struct ClockTelemetry {
    instance_id: Uuid,
}

impl ClockTelemetry {
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4(),
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn emit_created(&self, environment: Environment, active: bool, at: Timestamp) {
        event!(
            Level::INFO,
            instance_id = %self.instance_id,
            environment = %environment,
            active,
            timestamp = %at,
            "clock.created"
        );
    }

    pub fn emit_time_changed(&self, reason: ChangeReason, from: Timestamp, to: Timestamp) {
        event!(
            Level::DEBUG,
            instance_id = %self.instance_id,
            reason = ?reason,
            from = %from,
            to = %to,
            "clock.time_changed"
        );
    }

    pub fn emit_activation(&self, active: bool, environment: Environment) {
        if active {
            event!(
                Level::INFO,
                instance_id = %self.instance_id,
                environment = %environment,
                "clock.enabled"
            );
        } else {
            event!(
                Level::INFO,
                instance_id = %self.instance_id,
                environment = %environment,
                "clock.disabled"
            );
        }
    }

    pub fn emit_policy_denied(&self, environment: Environment) {
        event!(
            Level::WARN,
            instance_id = %self.instance_id,
            environment = %environment,
            "clock.policy_denied: virtual time cannot be enabled in this environment"
        );
    }

    pub fn emit_forced_in_production(&self) {
        event!(
            Level::WARN,
            instance_id = %self.instance_id,
            "clock.forced_in_production: activation was forced despite a production environment"
        );
    }

    pub fn emit_enable_after_destroy(&self) {
        event!(
            Level::WARN,
            instance_id = %self.instance_id,
            "clock.enable_after_destroy: ignored"
        );
    }

    pub fn emit_subscriber_failure(&self, subscriber: &str, message: &str) {
        event!(
            Level::ERROR,
            instance_id = %self.instance_id,
            subscriber = %subscriber,
            error = %message,
            "clock.subscriber_failed"
        );
    }

    pub fn emit_destroyed(&self) {
        event!(Level::INFO, instance_id = %self.instance_id, "clock.destroyed");
    }
}

impl Default for ClockTelemetry {
    fn default() -> Self {
        Self::new()
    }
}
