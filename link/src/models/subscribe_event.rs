use serde::{Deserialize, Serialize};

use crate::timetoken::Timetoken;

use super::{
    DecodeFailureEvent, FileEvent, MessageActionEvent, MessageEvent, ObjectsEvent, PresenceEvent,
};

/// A decoded event from a long-poll batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubscribeEvent {
    Message(MessageEvent),
    Signal(MessageEvent),
    Presence(PresenceEvent),
    Objects(ObjectsEvent),
    MessageAction(MessageActionEvent),
    File(FileEvent),
    DecodeFailure(DecodeFailureEvent),
}

impl SubscribeEvent {
    /// Channel the event was received on.
    pub fn channel(&self) -> Option<&str> {
        match self {
            Self::Message(e) | Self::Signal(e) => Some(&e.channel),
            Self::Presence(e) => Some(&e.channel),
            Self::Objects(e) => Some(&e.channel),
            Self::MessageAction(e) => Some(&e.channel),
            Self::File(e) => Some(&e.channel),
            Self::DecodeFailure(e) => e.channel.as_deref(),
        }
    }

    /// Publish timetoken of the event.
    pub fn timetoken(&self) -> Option<Timetoken> {
        match self {
            Self::Message(e) | Self::Signal(e) => Some(e.timetoken),
            Self::Presence(e) => Some(e.timetoken),
            Self::Objects(e) => Some(e.timetoken),
            Self::MessageAction(e) => Some(e.timetoken),
            Self::File(e) => Some(e.timetoken),
            Self::DecodeFailure(e) => e.timetoken,
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::Signal(_) => "signal",
            Self::Presence(_) => "presence",
            Self::Objects(_) => "objects",
            Self::MessageAction(_) => "message_action",
            Self::File(_) => "file",
            Self::DecodeFailure(_) => "decode_failure",
        }
    }
}
