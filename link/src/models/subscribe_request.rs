use serde_json::Value as JsonValue;
use std::time::Duration;

use crate::timetoken::Timetoken;

/// Parameters of one long-poll subscribe call.
///
/// Channel and group lists are already expanded with their `-pnpres`
/// companions. Keys, identity and auth are added by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscribeRequest {
    pub channels: Vec<String>,
    pub channel_groups: Vec<String>,

    /// Resume position; [`Timetoken::NOW`] starts a new session
    pub cursor: Timetoken,

    /// Presence timeout announced to the service
    pub heartbeat_secs: Option<u64>,

    pub filter_expression: Option<String>,

    /// `{channel: state}` presence state
    pub state: Option<JsonValue>,

    /// Request-level timeout of the long-poll
    pub timeout: Duration,
}
