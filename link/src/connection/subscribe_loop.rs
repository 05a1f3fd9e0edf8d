//! The subscribe loop: one background task per client that owns the
//! subscription set, the cursor and the reconnection state.
//!
//! ```text
//!   Idle ──subscribe──▶ Connecting ──ok──▶ Connected ◀──ok── Reconnecting
//!                           │                 │  ▲               │  ▲
//!                           └─────fail────────┴──┼───fail───────▶┘  │
//!                                                └──────retry───────┘
//!   any ──unsubscribe_all / destroy / retries exhausted──▶ Terminated
//! ```
//!
//! Callers talk to the task through [`SubscribeLoopHandle`]; every command is
//! handled between two awaits of the in-flight long-poll, so membership never
//! changes while a request is being built or a batch is being fanned out.

use bytes::Bytes;
use log::{debug, info, warn};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::decoder::{decode_envelope, EventDecoder};
use crate::error::{PulseLinkError, Result};
use crate::listener::ListenerRegistry;
use crate::models::{
    LeaveRequest, PulseConfig, StatusCategory, StatusEvent, StatusOperation, SubscribeOptions,
    SubscribeRequest, UnsubscribeOptions,
};
use crate::reconnection::{ReconnectionPolicy, ReconnectionState, RetryDecision};
use crate::subscription_set::{is_presence_name, SubscriptionDelta, SubscriptionSet};
use crate::timeouts::PulseTimeouts;
use crate::timetoken::Timetoken;
use crate::transport::Transport;

use super::COMMAND_CHANNEL_CAPACITY;

/// Lifecycle state of the subscribe loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopState {
    /// Nothing subscribed; the loop is parked.
    Idle,
    /// Long-poll in flight for a new or changed subscription.
    Connecting,
    /// Steady state: the last long-poll succeeded.
    Connected,
    /// The last long-poll failed; retrying per the reconnection policy.
    Reconnecting,
    /// Polling stopped (unsubscribe from everything, destroy, retries
    /// exhausted). A new subscribe call starts polling again.
    Terminated,
}

impl LoopState {
    /// Whether the loop issues long-polls in this state.
    pub fn is_polling(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected | Self::Reconnecting)
    }
}

/// Membership published for the heartbeat worker and for introspection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionSnapshot {
    pub channels: Vec<String>,
    pub channel_groups: Vec<String>,
    pub state: Option<JsonValue>,
}

impl SubscriptionSnapshot {
    fn of(set: &SubscriptionSet) -> Self {
        Self {
            channels: set.channels(),
            channel_groups: set.channel_groups(),
            state: set.state_json(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.channel_groups.is_empty()
    }
}

/// Loop settings derived from [`PulseConfig`] and [`PulseTimeouts`].
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub heartbeat_secs: Option<u64>,
    pub filter_expression: Option<String>,
    pub message_queue_overflow_count: usize,
    pub suppress_leave_events: bool,
    pub subscribe_timeout: Duration,
    pub policy: ReconnectionPolicy,
    pub max_retries: Option<u32>,
}

impl LoopSettings {
    pub fn from_config(config: &PulseConfig, timeouts: &PulseTimeouts) -> Self {
        Self {
            heartbeat_secs: Some(config.presence_timeout_secs),
            filter_expression: config.filter_expression.clone(),
            message_queue_overflow_count: config.message_queue_overflow_count,
            suppress_leave_events: config.suppress_leave_events,
            subscribe_timeout: timeouts.subscribe_request_timeout,
            policy: config.reconnection(),
            max_retries: config.max_retries(),
        }
    }
}

// ── Commands ────────────────────────────────────────────────────────────────

/// Commands sent from the public API to the subscribe loop.
enum LoopCmd {
    Subscribe {
        options: SubscribeOptions,
        result_tx: oneshot::Sender<Result<()>>,
    },
    Unsubscribe {
        options: UnsubscribeOptions,
        result_tx: oneshot::Sender<Result<()>>,
    },
    UnsubscribeAll {
        result_tx: oneshot::Sender<()>,
    },
    Shutdown {
        done_tx: Option<oneshot::Sender<()>>,
    },
}

/// What a handled command means for the in-flight long-poll.
enum CmdOutcome {
    /// Nothing changed; keep waiting on the current request
    Unchanged,
    /// Membership or cursor changed; drop the request and start over
    Restart,
    /// Stop the task
    Exit,
}

// ── Handle ──────────────────────────────────────────────────────────────────

/// Client-side handle of the subscribe loop task.
pub struct SubscribeLoopHandle {
    cmd_tx: mpsc::Sender<LoopCmd>,
    state_rx: watch::Receiver<LoopState>,
    snapshot_rx: watch::Receiver<SubscriptionSnapshot>,
    cursor_rx: watch::Receiver<Timetoken>,
    task: JoinHandle<()>,
}

impl SubscribeLoopHandle {
    /// Spawn the loop on the current tokio runtime.
    pub fn spawn(
        transport: Arc<dyn Transport>,
        decoder: EventDecoder,
        listeners: Arc<ListenerRegistry>,
        settings: LoopSettings,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel::<LoopCmd>(COMMAND_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(LoopState::Idle);
        let (snapshot_tx, snapshot_rx) = watch::channel(SubscriptionSnapshot::default());
        let (cursor_tx, cursor_rx) = watch::channel(Timetoken::NOW);

        let reconnection = ReconnectionState::new(settings.policy, settings.max_retries);
        let subscribe_loop = SubscribeLoop {
            transport,
            decoder,
            listeners,
            settings,
            set: SubscriptionSet::new(),
            cursor: Timetoken::NOW,
            reconnection,
            state: LoopState::Idle,
            retry_delay: None,
            announce: None,
            state_tx,
            snapshot_tx,
            cursor_tx,
        };
        let task = tokio::spawn(subscribe_loop.run(cmd_rx));

        Self {
            cmd_tx,
            state_rx,
            snapshot_rx,
            cursor_rx,
            task,
        }
    }

    pub async fn subscribe(&self, options: SubscribeOptions) -> Result<()> {
        let (result_tx, result_rx) = oneshot::channel();
        self.send(LoopCmd::Subscribe { options, result_tx }).await?;
        result_rx.await.map_err(|_| PulseLinkError::ClientDestroyed)?
    }

    pub async fn unsubscribe(&self, options: UnsubscribeOptions) -> Result<()> {
        let (result_tx, result_rx) = oneshot::channel();
        self.send(LoopCmd::Unsubscribe { options, result_tx }).await?;
        result_rx.await.map_err(|_| PulseLinkError::ClientDestroyed)?
    }

    pub async fn unsubscribe_all(&self) -> Result<()> {
        let (result_tx, result_rx) = oneshot::channel();
        self.send(LoopCmd::UnsubscribeAll { result_tx }).await?;
        result_rx.await.map_err(|_| PulseLinkError::ClientDestroyed)
    }

    /// Stop the loop and wait until it has emitted its final status.
    pub async fn shutdown(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(LoopCmd::Shutdown {
            done_tx: Some(done_tx),
        })
        .await?;
        done_rx.await.map_err(|_| PulseLinkError::ClientDestroyed)
    }

    pub fn state(&self) -> LoopState {
        *self.state_rx.borrow()
    }

    pub fn snapshot(&self) -> SubscriptionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn cursor(&self) -> Timetoken {
        *self.cursor_rx.borrow()
    }

    pub fn state_receiver(&self) -> watch::Receiver<LoopState> {
        self.state_rx.clone()
    }

    pub fn snapshot_receiver(&self) -> watch::Receiver<SubscriptionSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    async fn send(&self, cmd: LoopCmd) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| PulseLinkError::ClientDestroyed)
    }
}

impl Drop for SubscribeLoopHandle {
    fn drop(&mut self) {
        let _ = self.cmd_tx.try_send(LoopCmd::Shutdown { done_tx: None });
    }
}

// ── Background task ─────────────────────────────────────────────────────────

struct SubscribeLoop {
    transport: Arc<dyn Transport>,
    decoder: EventDecoder,
    listeners: Arc<ListenerRegistry>,
    settings: LoopSettings,
    set: SubscriptionSet,
    cursor: Timetoken,
    reconnection: ReconnectionState,
    state: LoopState,
    /// Wait this long before the next long-poll
    retry_delay: Option<Duration>,
    /// Channels and groups to report in the next `Connected` status
    announce: Option<(Vec<String>, Vec<String>)>,
    state_tx: watch::Sender<LoopState>,
    snapshot_tx: watch::Sender<SubscriptionSnapshot>,
    cursor_tx: watch::Sender<Timetoken>,
}

impl SubscribeLoop {
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<LoopCmd>) {
        debug!("[pulse-link] Subscribe loop started");
        'outer: loop {
            if !self.state.is_polling() {
                let cmd = cmd_rx.recv().await;
                match self.handle_command(cmd) {
                    CmdOutcome::Exit => break 'outer,
                    CmdOutcome::Unchanged | CmdOutcome::Restart => continue 'outer,
                }
            }

            if let Some(delay) = self.retry_delay.take() {
                debug!("[pulse-link] Next long-poll in {:?}", delay);
                let sleep = tokio::time::sleep(delay);
                tokio::pin!(sleep);
                loop {
                    tokio::select! {
                        biased;
                        cmd = cmd_rx.recv() => match self.handle_command(cmd) {
                            CmdOutcome::Unchanged => {},
                            CmdOutcome::Restart => continue 'outer,
                            CmdOutcome::Exit => break 'outer,
                        },
                        _ = &mut sleep => break,
                    }
                }
            }

            let request = self.build_request();
            let transport = self.transport.clone();
            let mut poll = transport.subscribe(&request);
            debug!(
                "[pulse-link] Long-poll: channels={:?} groups={:?} tt={}",
                request.channels, request.channel_groups, request.cursor
            );

            let result = loop {
                tokio::select! {
                    biased;
                    cmd = cmd_rx.recv() => match self.handle_command(cmd) {
                        CmdOutcome::Unchanged => {},
                        CmdOutcome::Restart => continue 'outer,
                        CmdOutcome::Exit => break 'outer,
                    },
                    result = &mut poll => break result,
                }
            };
            drop(poll);
            self.on_poll_result(result);
        }
        debug!("[pulse-link] Subscribe loop stopped");
    }

    fn build_request(&self) -> SubscribeRequest {
        SubscribeRequest {
            channels: self.set.wire_channels(),
            channel_groups: self.set.wire_channel_groups(),
            cursor: self.cursor,
            heartbeat_secs: self.settings.heartbeat_secs,
            filter_expression: self.settings.filter_expression.clone(),
            state: self.set.state_json(),
            timeout: self.settings.subscribe_timeout,
        }
    }

    // ── Poll results ────────────────────────────────────────────────────────

    fn on_poll_result(&mut self, result: Result<Bytes>) {
        let envelope = match result.and_then(|body| decode_envelope(&body)) {
            Ok(envelope) => envelope,
            Err(e) => return self.on_poll_failure(e),
        };

        let announce = self.announce.take();
        if self.reconnection.is_recovering() {
            info!(
                "[pulse-link] Reconnected after {} failed long-poll(s)",
                self.reconnection.consecutive_failures()
            );
            self.emit(StatusCategory::Reconnected, StatusOperation::Subscribe, self.current(), None);
        } else if let Some(affected) = announce {
            info!("[pulse-link] Connected: channels={:?} groups={:?}", affected.0, affected.1);
            self.emit(StatusCategory::Connected, StatusOperation::Subscribe, affected, None);
        }
        self.reconnection.reset();
        self.set_state(LoopState::Connected);

        let overflow = self.settings.message_queue_overflow_count;
        if overflow > 0 && envelope.messages.len() >= overflow {
            warn!(
                "[pulse-link] Batch of {} item(s) reached the overflow threshold {}",
                envelope.messages.len(),
                overflow
            );
            self.emit(
                StatusCategory::RequestMessageCountExceeded,
                StatusOperation::Subscribe,
                self.current(),
                None,
            );
        }

        for event in self.decoder.decode_batch(&envelope) {
            self.listeners.broadcast_event(&event);
        }

        if self.cursor.is_now() || envelope.cursor.timestamp >= self.cursor.timestamp {
            self.cursor = envelope.cursor;
        } else {
            warn!(
                "[pulse-link] Ignoring regressing cursor {} (current {})",
                envelope.cursor, self.cursor
            );
        }
        self.cursor_tx.send_replace(self.cursor);
    }

    fn on_poll_failure(&mut self, error: PulseLinkError) {
        let category = StatusCategory::from_error(&error);
        let decision = self.reconnection.record_failure();
        self.emit(category, StatusOperation::Subscribe, self.current(), Some(&error));

        match decision {
            RetryDecision::Retry { attempt, delay } => {
                warn!(
                    "[pulse-link] Long-poll failed ({:?}): {}; retry {} in {:?}",
                    category, error, attempt, delay
                );
                self.retry_delay = Some(delay);
                self.set_state(LoopState::Reconnecting);
            },
            RetryDecision::Exhausted { failures } => {
                warn!(
                    "[pulse-link] Giving up after {} consecutive failure(s): {}",
                    failures, error
                );
                self.emit(
                    StatusCategory::ReconnectionAttemptsExhausted,
                    StatusOperation::Subscribe,
                    self.current(),
                    Some(&error),
                );
                self.announce = None;
                self.set_state(LoopState::Terminated);
            },
        }
    }

    // ── Commands ────────────────────────────────────────────────────────────

    fn handle_command(&mut self, cmd: Option<LoopCmd>) -> CmdOutcome {
        match cmd {
            Some(LoopCmd::Subscribe { options, result_tx }) => {
                let outcome = self.apply_subscribe(options);
                let _ = result_tx.send(Ok(()));
                outcome
            },
            Some(LoopCmd::Unsubscribe { options, result_tx }) => {
                let outcome = self.apply_unsubscribe(options);
                let _ = result_tx.send(Ok(()));
                outcome
            },
            Some(LoopCmd::UnsubscribeAll { result_tx }) => {
                let outcome = self.apply_unsubscribe_all();
                let _ = result_tx.send(());
                outcome
            },
            Some(LoopCmd::Shutdown { done_tx }) => {
                self.apply_unsubscribe_all();
                info!("[pulse-link] Subscribe loop shut down");
                if let Some(tx) = done_tx {
                    let _ = tx.send(());
                }
                CmdOutcome::Exit
            },
            None => {
                self.apply_unsubscribe_all();
                CmdOutcome::Exit
            },
        }
    }

    fn apply_subscribe(&mut self, options: SubscribeOptions) -> CmdOutcome {
        let delta = self.set.add(&options.channels, &options.channel_groups, options.with_presence);
        let mut changed = !delta.is_empty();
        for (channel, state) in options.state {
            changed |= self.set.set_state(&channel, state);
        }
        if let Some(timetoken) = options.timetoken {
            debug!("[pulse-link] Cursor set to {} by caller", timetoken);
            self.cursor = timetoken;
            self.cursor_tx.send_replace(self.cursor);
            changed = true;
        }

        if !self.state.is_polling() {
            // Fresh session, or a restart after termination.
            self.reconnection.reset();
            self.retry_delay = None;
            self.announce = Some(self.current());
            self.publish_snapshot();
            self.set_state(LoopState::Connecting);
            return CmdOutcome::Restart;
        }
        if !changed {
            return CmdOutcome::Unchanged;
        }

        if !delta.is_empty() {
            let (mut channels, mut groups) = self.announce.take().unwrap_or_default();
            channels.extend(delta.channels);
            groups.extend(delta.channel_groups);
            self.announce = Some((channels, groups));
        }
        self.retry_delay = None;
        self.publish_snapshot();
        if !self.reconnection.is_recovering() {
            self.set_state(LoopState::Connecting);
        }
        CmdOutcome::Restart
    }

    fn apply_unsubscribe(&mut self, options: UnsubscribeOptions) -> CmdOutcome {
        let delta = self.set.remove(&options.channels, &options.channel_groups);
        if delta.is_empty() {
            return CmdOutcome::Unchanged;
        }
        self.spawn_leave(&delta);
        self.publish_snapshot();
        self.emit(
            StatusCategory::Acknowledgment,
            StatusOperation::Unsubscribe,
            (delta.channels, delta.channel_groups),
            None,
        );

        if self.set.is_empty() {
            self.reset_session();
            self.emit(StatusCategory::Disconnected, StatusOperation::Unsubscribe, (vec![], vec![]), None);
            self.set_state(LoopState::Idle);
        } else if self.state.is_polling() {
            self.retry_delay = None;
            if !self.reconnection.is_recovering() {
                self.set_state(LoopState::Connecting);
            }
        } else {
            return CmdOutcome::Unchanged;
        }
        CmdOutcome::Restart
    }

    fn apply_unsubscribe_all(&mut self) -> CmdOutcome {
        let delta = self.set.clear();
        let was_polling = self.state.is_polling();
        self.reset_session();
        self.publish_snapshot();
        if delta.is_empty() && !was_polling {
            return CmdOutcome::Unchanged;
        }
        self.spawn_leave(&delta);
        self.emit(
            StatusCategory::Disconnected,
            StatusOperation::Unsubscribe,
            (delta.channels, delta.channel_groups),
            None,
        );
        self.set_state(LoopState::Terminated);
        CmdOutcome::Restart
    }

    /// Forget cursor and failures; the next subscribe starts from "now".
    fn reset_session(&mut self) {
        self.cursor = Timetoken::NOW;
        self.cursor_tx.send_replace(self.cursor);
        self.reconnection.reset();
        self.retry_delay = None;
        self.announce = None;
    }

    fn spawn_leave(&self, delta: &SubscriptionDelta) {
        if self.settings.suppress_leave_events {
            return;
        }
        let request = LeaveRequest {
            channels: without_presence(&delta.channels),
            channel_groups: without_presence(&delta.channel_groups),
        };
        if request.channels.is_empty() && request.channel_groups.is_empty() {
            return;
        }
        let transport = self.transport.clone();
        tokio::spawn(async move {
            match transport.leave(&request).await {
                Ok(()) => debug!("[pulse-link] Left channels={:?} groups={:?}", request.channels, request.channel_groups),
                Err(e) => warn!("[pulse-link] Leave failed: {}", e),
            }
        });
    }

    // ── Outputs ─────────────────────────────────────────────────────────────

    fn current(&self) -> (Vec<String>, Vec<String>) {
        (self.set.channels(), self.set.channel_groups())
    }

    fn emit(
        &self,
        category: StatusCategory,
        operation: StatusOperation,
        affected: (Vec<String>, Vec<String>),
        error: Option<&PulseLinkError>,
    ) {
        let mut status = StatusEvent::new(category, operation)
            .with_affected(affected.0, affected.1)
            .with_subscribed(self.set.channels(), self.set.channel_groups());
        if let Some(error) = error {
            status = status.with_error(error);
        }
        self.listeners.broadcast_status(&status);
    }

    fn set_state(&mut self, state: LoopState) {
        if self.state != state {
            debug!("[pulse-link] Loop state {:?} -> {:?}", self.state, state);
            self.state = state;
            self.state_tx.send_replace(state);
        }
    }

    fn publish_snapshot(&self) {
        self.snapshot_tx.send_replace(SubscriptionSnapshot::of(&self.set));
    }
}

fn without_presence(names: &[String]) -> Vec<String> {
    names.iter().filter(|name| !is_presence_name(name)).cloned().collect()
}
