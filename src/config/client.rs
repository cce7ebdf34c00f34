//! Reconnecting client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::client_id::{render_url, ClientId};
use crate::error::ConfigError;

/// Settings for one [`ReconnectingClient`](crate::runtime::ReconnectingClient).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Server URL. May contain `{client_id}`, replaced per connection attempt.
    #[serde(default)]
    pub url: String,
    /// Gate for every automatic and requested connection attempt.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Delay before the first reconnect; doubles per attempt (milliseconds).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on the exponential part of the delay (milliseconds).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Random jitter added on top of the delay, exclusive bound (milliseconds).
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
    /// Scheduled reconnects allowed before giving up.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Liveness ping period while open (milliseconds, 0 disables).
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    /// Time allowed for a transport to open (milliseconds).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Requested connects closer together than this are dropped (milliseconds).
    #[serde(default = "default_min_attempt_interval_ms")]
    pub min_attempt_interval_ms: u64,
    /// Pause between the disconnect and connect halves of a forced reconnect.
    #[serde(default = "default_force_reconnect_delay_ms")]
    pub force_reconnect_delay_ms: u64,
    /// Capacity of the event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the breaker.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Quiet period after the last failure before the breaker may close.
    #[serde(default = "default_reset_after_ms")]
    pub reset_after_ms: u64,
}

const fn default_enabled() -> bool {
    true
}

const fn default_base_delay_ms() -> u64 {
    5000
}

const fn default_max_delay_ms() -> u64 {
    30_000
}

const fn default_jitter_ms() -> u64 {
    1000
}

const fn default_max_reconnect_attempts() -> u32 {
    10
}

const fn default_ping_interval_ms() -> u64 {
    30_000
}

const fn default_connect_timeout_ms() -> u64 {
    10_000
}

const fn default_min_attempt_interval_ms() -> u64 {
    1000
}

const fn default_force_reconnect_delay_ms() -> u64 {
    1000
}

const fn default_event_capacity() -> usize {
    256
}

const fn default_failure_threshold() -> u32 {
    5
}

const fn default_reset_after_ms() -> u64 {
    60_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            enabled: default_enabled(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: default_jitter_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            ping_interval_ms: default_ping_interval_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            min_attempt_interval_ms: default_min_attempt_interval_ms(),
            force_reconnect_delay_ms: default_force_reconnect_delay_ms(),
            event_capacity: default_event_capacity(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_after_ms: default_reset_after_ms(),
        }
    }
}

impl ClientConfig {
    /// Default settings pointed at `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// `None` when pinging is disabled.
    #[must_use]
    pub const fn ping_interval(&self) -> Option<Duration> {
        if self.ping_interval_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.ping_interval_ms))
        }
    }

    #[must_use]
    pub const fn min_attempt_interval(&self) -> Duration {
        Duration::from_millis(self.min_attempt_interval_ms)
    }

    #[must_use]
    pub const fn force_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.force_reconnect_delay_ms)
    }

    /// Check that the settings describe a usable client.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an empty or non-WebSocket URL, or when the
    /// connect timeout, attempt budget, breaker threshold or event capacity
    /// is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "client.url" });
        }

        let rendered = render_url(&self.url, &ClientId::generate());
        let parsed = Url::parse(&rendered).map_err(|e| ConfigError::InvalidValue {
            field: "client.url",
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(ConfigError::InvalidValue {
                field: "client.url",
                reason: format!("scheme must be ws or wss, got {}", parsed.scheme()),
            });
        }

        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "client.connect_timeout_ms",
                reason: "must be greater than zero".into(),
            });
        }
        if self.max_reconnect_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "client.max_reconnect_attempts",
                reason: "must be at least 1".into(),
            });
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "client.circuit_breaker.failure_threshold",
                reason: "must be greater than zero".into(),
            });
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "client.event_capacity",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}
