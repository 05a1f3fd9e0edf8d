use serde_json::Value as JsonValue;

/// Parameters of one presence heartbeat call.
#[derive(Debug, Clone, PartialEq)]
pub struct HeartbeatRequest {
    pub channels: Vec<String>,
    pub channel_groups: Vec<String>,
    pub heartbeat_secs: Option<u64>,
    pub state: Option<JsonValue>,
}
