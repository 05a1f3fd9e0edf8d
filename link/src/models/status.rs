use serde::{Deserialize, Serialize};

use crate::error::PulseLinkError;

/// What happened to the subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    /// First successful long-poll of a session.
    Connected,
    /// First successful long-poll after one or more failures.
    Reconnected,
    /// Polling stopped on request (unsubscribe from everything, destroy).
    Disconnected,
    /// Transport failure; the loop retries according to its policy.
    UnexpectedDisconnect,
    /// The long-poll request timed out.
    Timeout,
    /// The service rejected the request with 403.
    AccessDenied,
    /// The service rejected the request with 400.
    BadRequest,
    /// The service rejected the request with 414 (too many channels).
    RequestUriTooLong,
    /// A single batch carried at least the configured overflow count.
    RequestMessageCountExceeded,
    /// The response envelope could not be parsed.
    DecodeFailure,
    /// The reconnection policy gave up; the loop is terminated.
    ReconnectionAttemptsExhausted,
    /// An unsubscribe or heartbeat completed.
    Acknowledgment,
    /// A heartbeat call failed.
    HeartbeatFailed,
}

impl StatusCategory {
    /// Whether this category reports a failure.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedDisconnect
                | Self::Timeout
                | Self::AccessDenied
                | Self::BadRequest
                | Self::RequestUriTooLong
                | Self::DecodeFailure
                | Self::ReconnectionAttemptsExhausted
                | Self::HeartbeatFailed
        )
    }

    /// Classify a failed long-poll.
    pub fn from_error(error: &PulseLinkError) -> Self {
        match error {
            PulseLinkError::TimeoutError(_) => Self::Timeout,
            PulseLinkError::DecodeError(_) => Self::DecodeFailure,
            PulseLinkError::ServerError { status_code, .. } => match status_code {
                400 => Self::BadRequest,
                403 => Self::AccessDenied,
                414 => Self::RequestUriTooLong,
                _ => Self::UnexpectedDisconnect,
            },
            _ => Self::UnexpectedDisconnect,
        }
    }
}

/// Operation that produced a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusOperation {
    Subscribe,
    Unsubscribe,
    Heartbeat,
}

/// A status transition delivered to every listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub category: StatusCategory,
    pub operation: StatusOperation,

    /// Channels the transition is about (added, removed, or polled)
    #[serde(default)]
    pub affected_channels: Vec<String>,

    /// Channel groups the transition is about
    #[serde(default)]
    pub affected_channel_groups: Vec<String>,

    /// Channels subscribed once the transition took effect
    #[serde(default)]
    pub subscribed_channels: Vec<String>,

    /// Channel groups subscribed once the transition took effect
    #[serde(default)]
    pub subscribed_channel_groups: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl StatusEvent {
    /// Create a status with no channel information.
    pub fn new(category: StatusCategory, operation: StatusOperation) -> Self {
        Self {
            category,
            operation,
            affected_channels: Vec::new(),
            affected_channel_groups: Vec::new(),
            subscribed_channels: Vec::new(),
            subscribed_channel_groups: Vec::new(),
            error: None,
            status_code: None,
        }
    }

    /// Status describing a failed request.
    pub fn from_error(operation: StatusOperation, error: &PulseLinkError) -> Self {
        let category = match operation {
            StatusOperation::Heartbeat => StatusCategory::HeartbeatFailed,
            _ => StatusCategory::from_error(error),
        };
        Self::new(category, operation).with_error(error)
    }

    pub fn with_affected(mut self, channels: Vec<String>, channel_groups: Vec<String>) -> Self {
        self.affected_channels = channels;
        self.affected_channel_groups = channel_groups;
        self
    }

    pub fn with_subscribed(mut self, channels: Vec<String>, channel_groups: Vec<String>) -> Self {
        self.subscribed_channels = channels;
        self.subscribed_channel_groups = channel_groups;
        self
    }

    /// Attach error text and, for service errors, the HTTP status.
    pub fn with_error(mut self, error: &PulseLinkError) -> Self {
        self.error = Some(error.to_string());
        self.status_code = error.status_code();
        self
    }

    pub fn is_error(&self) -> bool {
        self.category.is_error()
    }
}
