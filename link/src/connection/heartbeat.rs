//! Periodic presence heartbeat.
//!
//! Runs next to the subscribe loop on its own timer and reads membership from
//! the loop's snapshot channel. A failed heartbeat is reported according to
//! [`HeartbeatNotificationOptions`] and never affects the long-poll.

use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::listener::ListenerRegistry;
use crate::models::{
    HeartbeatNotificationOptions, HeartbeatRequest, StatusCategory, StatusEvent, StatusOperation,
};
use crate::transport::Transport;

use super::{LoopState, SubscriptionSnapshot};

/// Heartbeat worker settings.
#[derive(Debug, Clone)]
pub struct HeartbeatSettings {
    pub interval: Duration,
    /// Presence timeout announced with every heartbeat
    pub heartbeat_secs: u64,
    pub notifications: HeartbeatNotificationOptions,
}

/// Spawn the heartbeat worker.
///
/// The task ends by itself once the subscribe loop is gone (its watch
/// channels close); callers may also abort the returned handle.
pub fn spawn_heartbeat(
    transport: Arc<dyn Transport>,
    listeners: Arc<ListenerRegistry>,
    state_rx: watch::Receiver<LoopState>,
    snapshot_rx: watch::Receiver<SubscriptionSnapshot>,
    settings: HeartbeatSettings,
) -> JoinHandle<()> {
    tokio::spawn(heartbeat_task(transport, listeners, state_rx, snapshot_rx, settings))
}

async fn heartbeat_task(
    transport: Arc<dyn Transport>,
    listeners: Arc<ListenerRegistry>,
    mut state_rx: watch::Receiver<LoopState>,
    mut snapshot_rx: watch::Receiver<SubscriptionSnapshot>,
    settings: HeartbeatSettings,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + settings.interval, settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!("[pulse-link] Heartbeat worker started (every {:?})", settings.interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !state_rx.borrow().is_polling() {
                    continue;
                }
                let snapshot = snapshot_rx.borrow().clone();
                if snapshot.is_empty() {
                    continue;
                }
                send_heartbeat(transport.as_ref(), &listeners, &snapshot, &settings).await;
            }
            changed = snapshot_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    debug!("[pulse-link] Heartbeat worker stopped");
}

async fn send_heartbeat(
    transport: &dyn Transport,
    listeners: &ListenerRegistry,
    snapshot: &SubscriptionSnapshot,
    settings: &HeartbeatSettings,
) {
    let request = HeartbeatRequest {
        channels: snapshot.channels.clone(),
        channel_groups: snapshot.channel_groups.clone(),
        heartbeat_secs: Some(settings.heartbeat_secs),
        state: snapshot.state.clone(),
    };

    let status = match transport.heartbeat(&request).await {
        Ok(()) => {
            debug!("[pulse-link] Heartbeat ok for {:?}", request.channels);
            if settings.notifications != HeartbeatNotificationOptions::All {
                return;
            }
            StatusEvent::new(StatusCategory::Acknowledgment, StatusOperation::Heartbeat)
        },
        Err(e) => {
            warn!("[pulse-link] Heartbeat failed: {}", e);
            if settings.notifications == HeartbeatNotificationOptions::None {
                return;
            }
            StatusEvent::from_error(StatusOperation::Heartbeat, &e)
        },
    };
    listeners.broadcast_status(
        &status
            .with_affected(request.channels.clone(), request.channel_groups.clone())
            .with_subscribed(request.channels, request.channel_groups),
    );
}
