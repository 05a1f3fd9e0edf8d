//! Callback-style listener hooks.
//!
//! Instead of draining a [`ListenerEvents`](crate::ListenerEvents) mailbox
//! yourself, register closures and turn them into a listener with
//! [`Listener::with_handlers`](crate::Listener::with_handlers):
//!
//! - [`on_status`](EventHandlers::on_status): every status transition
//! - [`on_message`](EventHandlers::on_message) / [`on_signal`](EventHandlers::on_signal)
//! - [`on_presence`](EventHandlers::on_presence): join, leave, timeout, state-change, interval
//! - [`on_objects`](EventHandlers::on_objects), [`on_message_action`](EventHandlers::on_message_action),
//!   [`on_file`](EventHandlers::on_file)
//! - [`on_decode_failure`](EventHandlers::on_decode_failure): items that could not be decoded
//!
//! # Example
//!
//! ```rust,no_run
//! use pulse_link::{EventHandlers, Listener, PulseClient, PulseConfig, SubscribeOptions};
//!
//! # async fn example() -> pulse_link::Result<()> {
//! let handlers = EventHandlers::new()
//!     .on_status(|status| println!("status: {:?}", status.category))
//!     .on_message(|message| println!("{}: {}", message.channel, message.payload));
//!
//! let client = PulseClient::builder()
//!     .config(PulseConfig::new("sub-c-demo", "device-42"))
//!     .build()?;
//! client.add_listener(&Listener::with_handlers(handlers));
//! client.subscribe(SubscribeOptions::new().with_channels(["chat"])).await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use crate::listener::ListenerEvent;
use crate::models::{
    DecodeFailureEvent, FileEvent, MessageActionEvent, MessageEvent, ObjectsEvent, PresenceEvent,
    StatusEvent, SubscribeEvent,
};

/// Type alias for the on_status callback.
pub type OnStatusCallback = Arc<dyn Fn(StatusEvent) + Send + Sync>;

/// Type alias for the on_message and on_signal callbacks.
pub type OnMessageCallback = Arc<dyn Fn(MessageEvent) + Send + Sync>;

/// Type alias for the on_presence callback.
pub type OnPresenceCallback = Arc<dyn Fn(PresenceEvent) + Send + Sync>;

/// Type alias for the on_objects callback.
pub type OnObjectsCallback = Arc<dyn Fn(ObjectsEvent) + Send + Sync>;

/// Type alias for the on_message_action callback.
pub type OnMessageActionCallback = Arc<dyn Fn(MessageActionEvent) + Send + Sync>;

/// Type alias for the on_file callback.
pub type OnFileCallback = Arc<dyn Fn(FileEvent) + Send + Sync>;

/// Type alias for the on_decode_failure callback.
pub type OnDecodeFailureCallback = Arc<dyn Fn(DecodeFailureEvent) + Send + Sync>;

/// Subscription event handlers.
///
/// All handlers are optional; events without a handler are discarded.
/// Handlers run on the listener's drain task, one event at a time and in
/// delivery order, so a slow handler only delays its own listener.
#[derive(Clone, Default)]
pub struct EventHandlers {
    pub(crate) on_status: Option<OnStatusCallback>,
    pub(crate) on_message: Option<OnMessageCallback>,
    pub(crate) on_signal: Option<OnMessageCallback>,
    pub(crate) on_presence: Option<OnPresenceCallback>,
    pub(crate) on_objects: Option<OnObjectsCallback>,
    pub(crate) on_message_action: Option<OnMessageActionCallback>,
    pub(crate) on_file: Option<OnFileCallback>,
    pub(crate) on_decode_failure: Option<OnDecodeFailureCallback>,
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_status", &self.on_status.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("on_signal", &self.on_signal.is_some())
            .field("on_presence", &self.on_presence.is_some())
            .field("on_objects", &self.on_objects.is_some())
            .field("on_message_action", &self.on_message_action.is_some())
            .field("on_file", &self.on_file.is_some())
            .field("on_decode_failure", &self.on_decode_failure.is_some())
            .finish()
    }
}

impl EventHandlers {
    /// Create a new empty `EventHandlers` (no callbacks registered).
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked on every status transition.
    ///
    /// # Example
    /// ```rust
    /// use pulse_link::{EventHandlers, StatusCategory};
    ///
    /// let handlers = EventHandlers::new().on_status(|status| {
    ///     if status.category == StatusCategory::ReconnectionAttemptsExhausted {
    ///         eprintln!("gave up: {:?}", status.error);
    ///     }
    /// });
    /// ```
    pub fn on_status(mut self, f: impl Fn(StatusEvent) + Send + Sync + 'static) -> Self {
        self.on_status = Some(Arc::new(f));
        self
    }

    /// Register a callback invoked for every published message.
    pub fn on_message(mut self, f: impl Fn(MessageEvent) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Arc::new(f));
        self
    }

    /// Register a callback invoked for every signal.
    pub fn on_signal(mut self, f: impl Fn(MessageEvent) + Send + Sync + 'static) -> Self {
        self.on_signal = Some(Arc::new(f));
        self
    }

    /// Register a callback invoked for presence events.
    ///
    /// Presence events only arrive for channels subscribed with presence
    /// enabled.
    pub fn on_presence(mut self, f: impl Fn(PresenceEvent) + Send + Sync + 'static) -> Self {
        self.on_presence = Some(Arc::new(f));
        self
    }

    pub fn on_objects(mut self, f: impl Fn(ObjectsEvent) + Send + Sync + 'static) -> Self {
        self.on_objects = Some(Arc::new(f));
        self
    }

    pub fn on_message_action(
        mut self,
        f: impl Fn(MessageActionEvent) + Send + Sync + 'static,
    ) -> Self {
        self.on_message_action = Some(Arc::new(f));
        self
    }

    pub fn on_file(mut self, f: impl Fn(FileEvent) + Send + Sync + 'static) -> Self {
        self.on_file = Some(Arc::new(f));
        self
    }

    /// Register a callback for batch items that could not be decoded or
    /// decrypted.
    pub fn on_decode_failure(
        mut self,
        f: impl Fn(DecodeFailureEvent) + Send + Sync + 'static,
    ) -> Self {
        self.on_decode_failure = Some(Arc::new(f));
        self
    }

    /// Returns `true` if any handler is registered.
    pub fn has_any(&self) -> bool {
        self.on_status.is_some()
            || self.on_message.is_some()
            || self.on_signal.is_some()
            || self.on_presence.is_some()
            || self.on_objects.is_some()
            || self.on_message_action.is_some()
            || self.on_file.is_some()
            || self.on_decode_failure.is_some()
    }

    // ---------------------------------------------------------------
    // Internal dispatch helpers
    // ---------------------------------------------------------------

    /// Route one mailbox item to its handler.
    pub(crate) fn dispatch(&self, event: ListenerEvent) {
        match event {
            ListenerEvent::Status(status) => self.emit_status(status),
            ListenerEvent::Event(event) => self.emit_event(event),
        }
    }

    pub(crate) fn emit_status(&self, status: StatusEvent) {
        if let Some(cb) = &self.on_status {
            cb(status);
        }
    }

    pub(crate) fn emit_event(&self, event: SubscribeEvent) {
        match event {
            SubscribeEvent::Message(message) => emit(&self.on_message, message),
            SubscribeEvent::Signal(signal) => emit(&self.on_signal, signal),
            SubscribeEvent::Presence(presence) => emit(&self.on_presence, presence),
            SubscribeEvent::Objects(objects) => emit(&self.on_objects, objects),
            SubscribeEvent::MessageAction(action) => emit(&self.on_message_action, action),
            SubscribeEvent::File(file) => emit(&self.on_file, file),
            SubscribeEvent::DecodeFailure(failure) => emit(&self.on_decode_failure, failure),
        }
    }
}

fn emit<T>(callback: &Option<Arc<dyn Fn(T) + Send + Sync>>, value: T) {
    if let Some(cb) = callback {
        cb(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StatusCategory, StatusOperation};
    use crate::timetoken::Timetoken;
    use parking_lot::Mutex;
    use serde_json::json;

    fn message(channel: &str) -> MessageEvent {
        MessageEvent {
            channel: channel.to_string(),
            subscription: None,
            publisher: None,
            timetoken: Timetoken::from_timestamp(1),
            payload: json!("hi"),
            user_metadata: None,
        }
    }

    #[test]
    fn test_empty_handlers() {
        let handlers = EventHandlers::new();
        assert!(!handlers.has_any());
        // Dispatching without handlers is a no-op.
        handlers.dispatch(ListenerEvent::Event(SubscribeEvent::Message(message("a"))));
    }

    #[test]
    fn test_dispatch_routes_by_kind() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (s1, s2, s3) = (seen.clone(), seen.clone(), seen.clone());
        let handlers = EventHandlers::new()
            .on_message(move |m| s1.lock().push(format!("message:{}", m.channel)))
            .on_signal(move |m| s2.lock().push(format!("signal:{}", m.channel)))
            .on_status(move |s| s3.lock().push(format!("status:{:?}", s.category)));
        assert!(handlers.has_any());

        handlers.dispatch(ListenerEvent::Event(SubscribeEvent::Signal(message("typing"))));
        handlers.dispatch(ListenerEvent::Event(SubscribeEvent::Message(message("chat"))));
        handlers.dispatch(ListenerEvent::Status(StatusEvent::new(
            StatusCategory::Connected,
            StatusOperation::Subscribe,
        )));

        assert_eq!(
            *seen.lock(),
            vec!["signal:typing", "message:chat", "status:Connected"]
        );
    }

    #[test]
    fn test_debug_shows_registered_handlers() {
        let handlers = EventHandlers::new().on_file(|_| {});
        let debug = format!("{:?}", handlers);
        assert!(debug.contains("on_file: true"));
        assert!(debug.contains("on_message: false"));
    }
}
