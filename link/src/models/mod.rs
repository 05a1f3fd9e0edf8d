//! Data models for the pulse-link client library.
//!
//! Defines the client configuration, the long-poll wire envelope, the typed
//! events handed to listeners and the request parameters passed to the
//! transport.

pub mod config;
pub mod decode_failure_event;
pub mod file_event;
pub mod heartbeat_request;
pub mod leave_request;
pub mod message_action_event;
pub mod message_event;
pub mod objects_event;
pub mod presence_event;
pub mod status;
pub mod subscribe_envelope;
pub mod subscribe_event;
pub mod subscribe_options;
pub mod subscribe_request;


pub use config::{HeartbeatNotificationOptions, PulseConfig, MIN_PRESENCE_TIMEOUT_SECS};
pub use decode_failure_event::DecodeFailureEvent;
pub use file_event::FileEvent;
pub use heartbeat_request::HeartbeatRequest;
pub use leave_request::LeaveRequest;
pub use message_action_event::{MessageActionChange, MessageActionEvent};
pub use message_event::MessageEvent;
pub use objects_event::{ObjectsAction, ObjectsEvent, ObjectsEventKind};
pub use presence_event::{PresenceAction, PresenceEvent};
pub use status::{StatusCategory, StatusEvent, StatusOperation};
pub use subscribe_envelope::{EnvelopeItem, EnvelopeItemType, SubscribeEnvelope};
pub use subscribe_event::SubscribeEvent;
pub use subscribe_options::{SubscribeOptions, UnsubscribeOptions};
pub use subscribe_request::SubscribeRequest;
