use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{PulseLinkError, Result};
use crate::reconnection::{ReconnectionPolicy, ReconnectionPolicyKind};

/// Smallest presence timeout the service accepts.
pub const MIN_PRESENCE_TIMEOUT_SECS: u64 = 20;

/// Which heartbeat results are reported to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeartbeatNotificationOptions {
    /// Never report heartbeat results
    None,
    /// Report failed heartbeats only
    #[default]
    Failures,
    /// Report failures and successful heartbeats
    All,
}

/// Client configuration.
///
/// # Example
///
/// ```rust
/// use pulse_link::{PulseConfig, ReconnectionPolicyKind};
///
/// let config = PulseConfig::new("sub-c-demo", "device-42")
///     .with_reconnection_policy(ReconnectionPolicyKind::Linear)
///     .with_reconnection_base_delay_ms(500)
///     .with_max_reconnection_retries(5)
///     .with_filter_expression("priority == 'high'");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseConfig {
    /// Subscribe key of the keyset
    pub subscribe_key: String,

    /// Publish key; not used by the subscribe path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_key: Option<String>,

    /// Identity of this client (sent as `uuid`)
    pub user_id: String,

    /// Base URL of the service
    /// Default: https://ps.pulse.example
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Seconds without a heartbeat before the service times the client out
    /// Default: 300
    #[serde(default = "default_presence_timeout_secs")]
    pub presence_timeout_secs: u64,

    /// Seconds between heartbeats
    /// Default: None (derived as presence_timeout / 2 - 1); Some(0) disables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat_interval_secs: Option<u64>,

    #[serde(default)]
    pub heartbeat_notifications: HeartbeatNotificationOptions,

    /// Default: Exponential
    #[serde(default)]
    pub reconnection_policy: ReconnectionPolicyKind,

    /// Linear delay / exponential base in milliseconds
    /// Default: 2000
    #[serde(default = "default_reconnection_base_delay_ms")]
    pub reconnection_base_delay_ms: u64,

    /// Exponential cap in milliseconds
    /// Default: 150000
    #[serde(default = "default_reconnection_max_delay_ms")]
    pub reconnection_max_delay_ms: u64,

    /// Retries before giving up; -1 retries forever
    /// Default: 10
    #[serde(default = "default_max_reconnection_retries")]
    pub max_reconnection_retries: i32,

    /// Server-side filter applied to messages before delivery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_expression: Option<String>,

    /// Batch size that triggers a RequestMessageCountExceeded status; 0 disables
    /// Default: 100
    #[serde(default = "default_message_queue_overflow_count")]
    pub message_queue_overflow_count: usize,

    /// Skip presence leave calls on unsubscribe
    #[serde(default)]
    pub suppress_leave_events: bool,

    /// Mailbox size of each listener
    /// Default: 1000
    #[serde(default = "default_listener_queue_capacity")]
    pub listener_queue_capacity: usize,
}

fn default_origin() -> String {
    "https://ps.pulse.example".to_string()
}

fn default_presence_timeout_secs() -> u64 {
    300
}

fn default_reconnection_base_delay_ms() -> u64 {
    2000
}

fn default_reconnection_max_delay_ms() -> u64 {
    150_000
}

fn default_max_reconnection_retries() -> i32 {
    10
}

fn default_message_queue_overflow_count() -> usize {
    100
}

fn default_listener_queue_capacity() -> usize {
    1000
}

impl PulseConfig {
    /// Create a configuration with defaults for everything but the keys.
    pub fn new(subscribe_key: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            subscribe_key: subscribe_key.into(),
            publish_key: None,
            user_id: user_id.into(),
            origin: default_origin(),
            presence_timeout_secs: default_presence_timeout_secs(),
            heartbeat_interval_secs: None,
            heartbeat_notifications: HeartbeatNotificationOptions::default(),
            reconnection_policy: ReconnectionPolicyKind::default(),
            reconnection_base_delay_ms: default_reconnection_base_delay_ms(),
            reconnection_max_delay_ms: default_reconnection_max_delay_ms(),
            max_reconnection_retries: default_max_reconnection_retries(),
            filter_expression: None,
            message_queue_overflow_count: default_message_queue_overflow_count(),
            suppress_leave_events: false,
            listener_queue_capacity: default_listener_queue_capacity(),
        }
    }

    pub fn with_publish_key(mut self, key: impl Into<String>) -> Self {
        self.publish_key = Some(key.into());
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn with_presence_timeout_secs(mut self, secs: u64) -> Self {
        self.presence_timeout_secs = secs;
        self
    }

    /// Set the heartbeat interval; 0 disables the heartbeat worker.
    pub fn with_heartbeat_interval_secs(mut self, secs: u64) -> Self {
        self.heartbeat_interval_secs = Some(secs);
        self
    }

    pub fn with_heartbeat_notifications(mut self, options: HeartbeatNotificationOptions) -> Self {
        self.heartbeat_notifications = options;
        self
    }

    pub fn with_reconnection_policy(mut self, policy: ReconnectionPolicyKind) -> Self {
        self.reconnection_policy = policy;
        self
    }

    pub fn with_reconnection_base_delay_ms(mut self, ms: u64) -> Self {
        self.reconnection_base_delay_ms = ms;
        self
    }

    pub fn with_reconnection_max_delay_ms(mut self, ms: u64) -> Self {
        self.reconnection_max_delay_ms = ms;
        self
    }

    /// Set the retry bound; -1 retries forever.
    pub fn with_max_reconnection_retries(mut self, retries: i32) -> Self {
        self.max_reconnection_retries = retries;
        self
    }

    pub fn with_filter_expression(mut self, expression: impl Into<String>) -> Self {
        self.filter_expression = Some(expression.into());
        self
    }

    pub fn with_message_queue_overflow_count(mut self, count: usize) -> Self {
        self.message_queue_overflow_count = count;
        self
    }

    pub fn with_suppress_leave_events(mut self, suppress: bool) -> Self {
        self.suppress_leave_events = suppress;
        self
    }

    pub fn with_listener_queue_capacity(mut self, capacity: usize) -> Self {
        self.listener_queue_capacity = capacity;
        self
    }

    /// Heartbeat period, or `None` when heartbeats are disabled.
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        let secs = match self.heartbeat_interval_secs {
            Some(secs) => secs,
            None => (self.presence_timeout_secs / 2).saturating_sub(1),
        };
        (secs > 0).then(|| Duration::from_secs(secs))
    }

    /// Retry bound for the reconnection state; `None` means unbounded.
    pub fn max_retries(&self) -> Option<u32> {
        u32::try_from(self.max_reconnection_retries).ok()
    }

    /// Build the reconnection policy described by this configuration.
    pub fn reconnection(&self) -> ReconnectionPolicy {
        ReconnectionPolicy::from_kind(
            self.reconnection_policy,
            Duration::from_millis(self.reconnection_base_delay_ms),
            Duration::from_millis(self.reconnection_max_delay_ms),
        )
    }

    /// Check the configuration before a client is built from it.
    pub fn validate(&self) -> Result<()> {
        if self.subscribe_key.trim().is_empty() {
            return Err(PulseLinkError::ConfigurationError(
                "subscribe_key must not be empty".to_string(),
            ));
        }
        if self.user_id.trim().is_empty() {
            return Err(PulseLinkError::ConfigurationError(
                "user_id must not be empty".to_string(),
            ));
        }
        let origin = url::Url::parse(&self.origin).map_err(|e| {
            PulseLinkError::ConfigurationError(format!("Invalid origin '{}': {}", self.origin, e))
        })?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(PulseLinkError::ConfigurationError(format!(
                "origin must use http or https, got '{}'",
                origin.scheme()
            )));
        }
        if self.presence_timeout_secs < MIN_PRESENCE_TIMEOUT_SECS {
            return Err(PulseLinkError::ConfigurationError(format!(
                "presence_timeout_secs must be at least {}",
                MIN_PRESENCE_TIMEOUT_SECS
            )));
        }
        if self.max_reconnection_retries < -1 {
            return Err(PulseLinkError::ConfigurationError(
                "max_reconnection_retries must be -1 (unbounded) or >= 0".to_string(),
            ));
        }
        if self.listener_queue_capacity == 0 {
            return Err(PulseLinkError::ConfigurationError(
                "listener_queue_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Build a configuration from string key/value pairs (env files, CLI flags).
    ///
    /// Keys are the snake_case field names; dotted aliases such as
    /// `reconnection.policy` or `presence.timeout_secs` are accepted too.
    /// Unknown keys are rejected.
    pub fn from_map(values: &HashMap<String, String>) -> Result<Self> {
        let lookup = |key: &str| values.get(key).map(|v| v.trim().to_string());
        let subscribe_key = lookup("subscribe_key")
            .or_else(|| lookup("keys.subscribe"))
            .ok_or_else(|| PulseLinkError::ConfigurationError("subscribe_key is required".into()))?;
        let user_id = lookup("user_id")
            .or_else(|| lookup("client.user_id"))
            .ok_or_else(|| PulseLinkError::ConfigurationError("user_id is required".into()))?;

        let mut config = Self::new(subscribe_key, user_id);
        for (key, value) in values {
            let value = value.trim();
            match normalize_key(key) {
                "subscribe_key" | "user_id" => {},
                "publish_key" => config.publish_key = Some(value.to_string()),
                "origin" => config.origin = value.to_string(),
                "presence_timeout_secs" => config.presence_timeout_secs = parse_value(key, value)?,
                "heartbeat_interval_secs" => {
                    config.heartbeat_interval_secs = Some(parse_value(key, value)?)
                },
                "heartbeat_notifications" => {
                    config.heartbeat_notifications = parse_enum(key, value)?
                },
                "reconnection_policy" => config.reconnection_policy = parse_enum(key, value)?,
                "reconnection_base_delay_ms" => {
                    config.reconnection_base_delay_ms = parse_value(key, value)?
                },
                "reconnection_max_delay_ms" => {
                    config.reconnection_max_delay_ms = parse_value(key, value)?
                },
                "max_reconnection_retries" => {
                    config.max_reconnection_retries = parse_value(key, value)?
                },
                "filter_expression" => config.filter_expression = Some(value.to_string()),
                "message_queue_overflow_count" => {
                    config.message_queue_overflow_count = parse_value(key, value)?
                },
                "suppress_leave_events" => config.suppress_leave_events = parse_value(key, value)?,
                "listener_queue_capacity" => {
                    config.listener_queue_capacity = parse_value(key, value)?
                },
                _ => {
                    return Err(PulseLinkError::ConfigurationError(format!(
                        "Unknown configuration key '{}'",
                        key
                    )))
                },
            }
        }
        Ok(config)
    }
}

fn normalize_key(key: &str) -> &str {
    match key {
        "keys.subscribe" => "subscribe_key",
        "keys.publish" => "publish_key",
        "client.user_id" => "user_id",
        "presence.timeout_secs" => "presence_timeout_secs",
        "presence.heartbeat_interval_secs" => "heartbeat_interval_secs",
        "presence.heartbeat_notifications" => "heartbeat_notifications",
        "presence.suppress_leave_events" => "suppress_leave_events",
        "reconnection.policy" => "reconnection_policy",
        "reconnection.base_delay_ms" => "reconnection_base_delay_ms",
        "reconnection.max_delay_ms" => "reconnection_max_delay_ms",
        "reconnection.max_retries" => "max_reconnection_retries",
        other => other,
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| {
        PulseLinkError::ConfigurationError(format!("Invalid value '{}' for {}: {}", value, key, e))
    })
}

fn parse_enum<T: serde::de::DeserializeOwned>(key: &str, value: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(value.to_ascii_lowercase())).map_err(|e| {
        PulseLinkError::ConfigurationError(format!("Invalid value '{}' for {}: {}", value, key, e))
    })
}
