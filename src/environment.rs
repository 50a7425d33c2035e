//! Runtime environment classification and the activation policy gate.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "test" | "testing" => Ok(Environment::Test),
            "prod" | "production" => Ok(Environment::Production),
            other => Err(Error::Config(format!(
                "Unknown environment '{}'; expected 'development', 'test' or 'production'",
                other
            ))),
        }
    }
}

/// Raw inputs the classifier looks at. Kept separate from the process so the
/// resolution rules can be exercised without touching env vars.
#[derive(Clone, Debug, Default)]
pub struct EnvironmentSignals {
    /// Explicitly declared mode (`TIMESHIFT_ENV`, then `APP_ENV`).
    pub declared_mode: Option<String>,
    /// A known test runner marker was found.
    pub test_runner: bool,
    pub hostname: Option<String>,
    pub release_build: bool,
}

impl EnvironmentSignals {
    pub fn from_process() -> Self {
        let declared_mode = std::env::var("TIMESHIFT_ENV")
            .or_else(|_| std::env::var("APP_ENV"))
            .ok();
        let test_runner = ["NEXTEST_RUN_ID", "NEXTEST", "RUST_TEST_THREADS"]
            .iter()
            .any(|key| std::env::var_os(key).is_some());
        Self {
            declared_mode,
            test_runner,
            hostname: std::env::var("HOSTNAME").ok(),
            release_build: !cfg!(debug_assertions),
        }
    }
}

/// Resolves signals to an environment; falls back to `Development`.
pub fn classify_signals(signals: &EnvironmentSignals) -> Environment {
    if let Some(env) = signals
        .declared_mode
        .as_deref()
        .and_then(|mode| mode.parse::<Environment>().ok())
    {
        return env;
    }
    if signals.test_runner {
        return Environment::Test;
    }
    if signals.hostname.as_deref().is_some_and(is_local_host) {
        return Environment::Development;
    }
    if signals.release_build {
        return Environment::Production;
    }
    Environment::Development
}

pub fn classify() -> Environment {
    classify_signals(&EnvironmentSignals::from_process())
}

/// The policy gate: virtual time may never switch on by default in production.
pub fn is_activation_allowed(env: Environment) -> bool {
    !matches!(env, Environment::Production)
}

fn is_local_host(host: &str) -> bool {
    let host = host.trim().to_lowercase();
    matches!(host.as_str(), "localhost" | "127.0.0.1" | "::1") || host.ends_with(".local")
}
