//! Timeouts, poll intervals and per-call options.
//!
//! Defaults come from a [`SettingsProvider`]; each call may override them
//! through [`CallOptions`]. Resolution is field by field: a value set on the
//! call wins, otherwise the provider's value is used.

use std::time::Duration;

use serde_json::{Map, Value};

/// Default budget for a synchronous call.
pub const DEFAULT_MAX_TIMEOUT: Duration = Duration::from_secs(15);

/// Default interval between poll ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Source of default timing values.
///
/// Implement this to feed live settings (for example from a host editor's
/// configuration) into every call.
pub trait SettingsProvider: Send + Sync + 'static {
    /// Budget for a synchronous call when the caller sets none.
    fn max_timeout(&self) -> Duration;

    /// Poll interval when the caller sets none.
    fn poll_interval(&self) -> Duration;
}

/// Static settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Budget for a synchronous call.
    pub max_timeout: Duration,
    /// Interval between poll ticks.
    pub poll_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_timeout: DEFAULT_MAX_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl SettingsProvider for Settings {
    fn max_timeout(&self) -> Duration {
        self.max_timeout
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

/// Options for a single call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOptions {
    /// Budget for a synchronous call.
    pub timeout: Option<Duration>,
    /// Poll interval for poll-based accessors.
    pub interval: Option<Duration>,
    /// Override the operation's multiplicity flag.
    pub multiplicity: Option<bool>,
    /// Extra options passed through to the transport untouched.
    pub extra: Map<String, Value>,
}

impl CallOptions {
    /// Create empty options (all defaults).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the synchronous budget.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the poll interval.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Force the multiplicity flag.
    pub fn multiplicity(mut self, multiplicity: bool) -> Self {
        self.multiplicity = Some(multiplicity);
        self
    }

    /// Add a transport-specific option.
    pub fn extra(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    /// Effective synchronous budget.
    pub fn resolve_timeout(&self, settings: &dyn SettingsProvider) -> Duration {
        self.timeout.unwrap_or_else(|| settings.max_timeout())
    }

    /// Effective poll interval.
    pub fn resolve_interval(&self, settings: &dyn SettingsProvider) -> Duration {
        self.interval.unwrap_or_else(|| settings.poll_interval())
    }

    /// Options handed to the transport, with the operation's multiplicity
    /// applied unless the caller set one.
    pub fn send_options(&self, multiplicity: bool) -> SendOptions {
        SendOptions {
            multiplicity: self.multiplicity.unwrap_or(multiplicity),
            timeout: self.timeout,
            extra: self.extra.clone(),
        }
    }
}

/// Options received by a [`Transport`](crate::transport::Transport).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendOptions {
    /// Whether the batch expects a stream of events.
    pub multiplicity: bool,
    /// Caller's budget, if any.
    pub timeout: Option<Duration>,
    /// Caller-supplied transport options.
    pub extra: Map<String, Value>,
}
