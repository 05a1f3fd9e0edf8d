use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::timetoken::Timetoken;

/// An item of an otherwise valid batch that could not be decoded or
/// decrypted. The rest of the batch is still delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeFailureEvent {
    /// Channel of the item, when it could be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timetoken: Option<Timetoken>,

    pub reason: String,

    /// The item exactly as received
    pub raw: JsonValue,
}
