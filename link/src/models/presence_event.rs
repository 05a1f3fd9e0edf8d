use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::timetoken::Timetoken;

/// Kind of presence change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PresenceAction {
    Join,
    Leave,
    Timeout,
    StateChange,
    /// Periodic occupancy summary sent instead of individual events on busy
    /// channels.
    Interval,
}

/// Presence change on a channel (delivered on `<channel>-pnpres`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceEvent {
    pub action: PresenceAction,

    /// Channel the change happened on, without the `-pnpres` suffix
    pub channel: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,

    /// Occupant the event is about (absent for `interval`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupancy: Option<u64>,

    /// Unix seconds reported by the service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,

    /// Presence state attached by the occupant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<JsonValue>,

    /// Occupants who joined since the previous `interval` event
    #[serde(default)]
    pub join: Vec<String>,

    #[serde(default)]
    pub leave: Vec<String>,

    #[serde(default)]
    pub timeout: Vec<String>,

    /// The delta lists were too large; call here-now for the full roster
    #[serde(default)]
    pub here_now_refresh: bool,

    pub timetoken: Timetoken,
}
