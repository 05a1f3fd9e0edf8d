//! Timeout configuration for pulse-link operations.
//!
//! The long-poll subscribe call is held open by the service for up to five
//! minutes, so it gets its own (long) request timeout; every other call
//! (heartbeat, leave) uses the shorter non-subscribe timeout.

use std::time::Duration;

/// How long the service holds an idle long-poll open before answering with
/// an empty batch.
pub const SERVICE_HOLD_TIME: Duration = Duration::from_secs(280);

/// Timeout configuration for client operations.
///
/// # Examples
///
/// ```rust
/// use pulse_link::PulseTimeouts;
/// use std::time::Duration;
///
/// // Use defaults (recommended for most cases)
/// let timeouts = PulseTimeouts::default();
///
/// // Custom timeouts for high-latency environments
/// let timeouts = PulseTimeouts::builder()
///     .connect_timeout(Duration::from_secs(15))
///     .non_subscribe_request_timeout(Duration::from_secs(30))
///     .build();
///
/// // Aggressive timeouts for local development
/// let timeouts = PulseTimeouts::fast();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulseTimeouts {
    /// Timeout for establishing connections (TCP + TLS handshake).
    /// Default: 5 seconds
    pub connect_timeout: Duration,

    /// Request timeout of the long-poll subscribe call. Must exceed
    /// [`SERVICE_HOLD_TIME`] or every idle poll ends as a timeout; zero
    /// disables the request timeout.
    /// Default: 310 seconds
    pub subscribe_request_timeout: Duration,

    /// Request timeout for heartbeat and leave calls.
    /// Default: 10 seconds
    pub non_subscribe_request_timeout: Duration,
}

impl Default for PulseTimeouts {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            subscribe_request_timeout: Duration::from_secs(310),
            non_subscribe_request_timeout: Duration::from_secs(10),
        }
    }
}

impl PulseTimeouts {
    /// Create a new builder for custom timeout configuration.
    pub fn builder() -> PulseTimeoutsBuilder {
        PulseTimeoutsBuilder::new()
    }

    /// Short connect and non-subscribe timeouts for a service running on
    /// localhost. The long-poll still outlasts the service hold time.
    pub fn fast() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            subscribe_request_timeout: Duration::from_secs(300),
            non_subscribe_request_timeout: Duration::from_secs(3),
        }
    }

    /// Longer timeouts for high-latency or unreliable networks.
    pub fn relaxed() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            subscribe_request_timeout: Duration::from_secs(330),
            non_subscribe_request_timeout: Duration::from_secs(30),
        }
    }

    /// Check if a duration represents "no timeout" (zero or very large).
    pub fn is_no_timeout(duration: Duration) -> bool {
        duration.is_zero() || duration > Duration::from_secs(86400 * 365)
    }
}

/// Builder for creating custom [`PulseTimeouts`] configurations.
#[derive(Debug, Clone)]
pub struct PulseTimeoutsBuilder {
    timeouts: PulseTimeouts,
}

impl PulseTimeoutsBuilder {
    fn new() -> Self {
        Self {
            timeouts: PulseTimeouts::default(),
        }
    }

    /// Set the connection timeout (TCP + TLS handshake).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connect_timeout = timeout;
        self
    }

    /// Set the connection timeout in seconds.
    pub fn connect_timeout_secs(self, secs: u64) -> Self {
        self.connect_timeout(Duration::from_secs(secs))
    }

    /// Set the long-poll subscribe request timeout.
    pub fn subscribe_request_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.subscribe_request_timeout = timeout;
        self
    }

    /// Set the long-poll subscribe request timeout in seconds.
    pub fn subscribe_request_timeout_secs(self, secs: u64) -> Self {
        self.subscribe_request_timeout(Duration::from_secs(secs))
    }

    /// Set the heartbeat/leave request timeout.
    pub fn non_subscribe_request_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.non_subscribe_request_timeout = timeout;
        self
    }

    /// Set the heartbeat/leave request timeout in seconds.
    pub fn non_subscribe_request_timeout_secs(self, secs: u64) -> Self {
        self.non_subscribe_request_timeout(Duration::from_secs(secs))
    }

    /// Build the timeout configuration.
    pub fn build(self) -> PulseTimeouts {
        self.timeouts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts() {
        let timeouts = PulseTimeouts::default();
        assert_eq!(timeouts.connect_timeout, Duration::from_secs(5));
        assert_eq!(timeouts.subscribe_request_timeout, Duration::from_secs(310));
        assert_eq!(timeouts.non_subscribe_request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_builder() {
        let timeouts = PulseTimeouts::builder()
            .connect_timeout_secs(60)
            .subscribe_request_timeout_secs(320)
            .non_subscribe_request_timeout_secs(20)
            .build();

        assert_eq!(timeouts.connect_timeout, Duration::from_secs(60));
        assert_eq!(timeouts.subscribe_request_timeout, Duration::from_secs(320));
        assert_eq!(timeouts.non_subscribe_request_timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_presets() {
        assert!(PulseTimeouts::fast().connect_timeout <= Duration::from_secs(5));
        assert!(PulseTimeouts::relaxed().connect_timeout >= Duration::from_secs(30));
    }

    #[test]
    fn test_presets_outlast_service_hold() {
        for timeouts in [PulseTimeouts::default(), PulseTimeouts::fast(), PulseTimeouts::relaxed()] {
            assert!(
                timeouts.subscribe_request_timeout > SERVICE_HOLD_TIME,
                "{:?} would time out idle long-polls",
                timeouts
            );
        }
    }

    #[test]
    fn test_is_no_timeout() {
        assert!(PulseTimeouts::is_no_timeout(Duration::ZERO));
        assert!(!PulseTimeouts::is_no_timeout(Duration::from_secs(1)));
        assert!(!PulseTimeouts::is_no_timeout(Duration::from_secs(3600)));
    }
}
