use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::timetoken::Timetoken;

/// Which object the change is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectsEventKind {
    Uuid,
    Channel,
    Membership,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectsAction {
    Set,
    Delete,
}

/// Change of user, channel or membership metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectsEvent {
    pub kind: ObjectsEventKind,
    pub action: ObjectsAction,
    pub channel: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,

    pub timetoken: Timetoken,

    /// The object as sent by the service
    pub data: JsonValue,
}
