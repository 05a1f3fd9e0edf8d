//! # pulse-link
//!
//! Client SDK core for the Pulse publish/subscribe service.
//!
//! A [`PulseClient`] keeps one long-poll open against the subscribe endpoint,
//! resumes from the last [`Timetoken`] after every batch, reconnects with a
//! configurable [`ReconnectionPolicy`] and fans decoded events out to every
//! registered [`Listener`]. A presence heartbeat runs alongside on its own
//! timer.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pulse_link::{
//!     EventHandlers, Listener, PulseClient, PulseConfig, ReconnectionPolicyKind,
//!     SubscribeOptions,
//! };
//!
//! # async fn example() -> pulse_link::Result<()> {
//! let config = PulseConfig::new("sub-c-demo", "device-42")
//!     .with_reconnection_policy(ReconnectionPolicyKind::Exponential)
//!     .with_max_reconnection_retries(10);
//!
//! let client = PulseClient::builder().config(config).build()?;
//! client.add_listener(&Listener::with_handlers(
//!     EventHandlers::new()
//!         .on_status(|status| println!("status: {:?}", status.category))
//!         .on_message(|message| println!("{}: {}", message.channel, message.payload))
//!         .on_presence(|presence| println!("{:?} {:?}", presence.action, presence.uuid)),
//! ));
//!
//! client
//!     .subscribe(SubscribeOptions::new().with_channels(["chat", "alerts"]).with_presence(true))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod connection;
pub mod crypto;
pub mod decoder;
pub mod error;
pub mod event_handlers;
pub mod listener;
pub mod models;
pub mod reconnection;
pub mod subscription_set;
pub mod timeouts;
pub mod timetoken;
pub mod transport;

pub use auth::AuthProvider;
pub use client::{PulseClient, PulseClientBuilder};
pub use connection::{LoopState, SubscriptionSnapshot};
pub use crypto::CryptoModule;
pub use decoder::EventDecoder;
pub use error::{PulseLinkError, Result};
pub use event_handlers::EventHandlers;
pub use listener::{Listener, ListenerEvent, ListenerEvents, ListenerRegistry};
pub use models::{
    DecodeFailureEvent, FileEvent, HeartbeatNotificationOptions, MessageActionChange,
    MessageActionEvent, MessageEvent, ObjectsAction, ObjectsEvent, ObjectsEventKind,
    PresenceAction, PresenceEvent, PulseConfig, StatusCategory, StatusEvent, StatusOperation,
    SubscribeEvent, SubscribeOptions, UnsubscribeOptions,
};
pub use reconnection::{ReconnectionPolicy, ReconnectionPolicyKind, ReconnectionState, RetryDecision};
pub use subscription_set::SubscriptionSet;
pub use timeouts::{PulseTimeouts, SERVICE_HOLD_TIME};
pub use timetoken::Timetoken;
pub use transport::{HttpTransport, Transport};
