use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::timetoken::Timetoken;

/// A file was shared on a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEvent {
    pub channel: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    pub timetoken: Timetoken,

    /// Message published together with the file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<JsonValue>,

    pub file_id: String,
    pub file_name: String,

    /// Download location: `{origin}/v1/files/{sub_key}/channels/{channel}/files/{id}/{name}`
    pub file_url: String,
}
