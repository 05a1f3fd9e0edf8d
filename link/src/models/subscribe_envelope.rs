use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::timetoken::Timetoken;

/// One long-poll response: the next cursor plus the raw items.
///
/// Items stay as raw JSON here so that one malformed item does not fail the
/// whole batch; the decoder parses them one by one into [`EnvelopeItem`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeEnvelope {
    /// Cursor to send on the next long-poll
    #[serde(rename = "t")]
    pub cursor: Timetoken,

    /// Items in the order the service produced them
    #[serde(rename = "m", default)]
    pub messages: Vec<JsonValue>,
}

/// Wire type discriminator (`e`) of an envelope item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeItemType {
    Message,
    Signal,
    Objects,
    MessageAction,
    File,
}

impl EnvelopeItemType {
    /// Map the numeric discriminator; a missing value means a regular message.
    pub fn from_code(code: Option<u8>) -> Option<Self> {
        match code {
            None | Some(0) => Some(Self::Message),
            Some(1) => Some(Self::Signal),
            Some(2) => Some(Self::Objects),
            Some(3) => Some(Self::MessageAction),
            Some(4) => Some(Self::File),
            Some(_) => None,
        }
    }
}

/// A single item of the `m` array, in its compact wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeItem {
    /// Shard the item was stored on
    #[serde(rename = "a", default, skip_serializing_if = "Option::is_none")]
    pub shard: Option<String>,

    /// Subscription that matched (group name or wildcard pattern)
    #[serde(rename = "b", default, skip_serializing_if = "Option::is_none")]
    pub subscription_match: Option<String>,

    #[serde(rename = "c")]
    pub channel: String,

    #[serde(rename = "d", default)]
    pub payload: JsonValue,

    /// Type discriminator, see [`EnvelopeItemType`]
    #[serde(rename = "e", default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<u8>,

    #[serde(rename = "f", default)]
    pub flags: u32,

    #[serde(rename = "i", default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    #[serde(rename = "k", default, skip_serializing_if = "Option::is_none")]
    pub subscribe_key: Option<String>,

    #[serde(rename = "p")]
    pub publish_timetoken: Timetoken,

    #[serde(rename = "u", default, skip_serializing_if = "Option::is_none")]
    pub user_metadata: Option<JsonValue>,
}

impl EnvelopeItem {
    /// The subscription that matched, when it is not the channel itself.
    pub fn subscription(&self) -> Option<String> {
        self.subscription_match
            .as_ref()
            .filter(|name| **name != self.channel)
            .cloned()
    }
}
