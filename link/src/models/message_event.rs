use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::timetoken::Timetoken;

/// A published message or signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub channel: String,

    /// Group name or wildcard pattern through which the channel was matched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,

    /// `user_id` of the publisher, when the service reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    pub timetoken: Timetoken,

    /// Message body, decrypted when a crypto module is configured
    pub payload: JsonValue,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_metadata: Option<JsonValue>,
}
