//! Subscribe-side connection management.
//!
//! This module contains:
//! - [`subscribe_loop`]: the long-poll state machine task and its handle
//! - [`heartbeat`]: the periodic presence heartbeat worker

pub mod heartbeat;
pub mod subscribe_loop;

pub use heartbeat::{spawn_heartbeat, HeartbeatSettings};
pub use subscribe_loop::{LoopSettings, LoopState, SubscribeLoopHandle, SubscriptionSnapshot};

/// Capacity of the command channel between the client and the loop task.
pub(crate) const COMMAND_CHANNEL_CAPACITY: usize = 256;
