use serde::{Deserialize, Serialize};

use crate::timetoken::Timetoken;

/// Whether a message action was added or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageActionChange {
    Added,
    Removed,
}

/// Reaction, receipt or other annotation attached to a stored message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageActionEvent {
    pub change: MessageActionChange,
    pub channel: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    pub timetoken: Timetoken,

    /// Action type, e.g. `reaction` or `receipt`
    pub action_type: String,
    pub value: String,

    /// Timetoken of the message the action is attached to
    pub message_timetoken: Timetoken,
    pub action_timetoken: Timetoken,
}
