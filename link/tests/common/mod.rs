#![allow(dead_code)]
//! Shared helpers for the pulse-link integration tests.
//!
//! [`MockTransport`] replaces the HTTP layer: every long-poll pops the next
//! scripted response, and once the script runs dry the poll parks until the
//! test pushes another one. Heartbeat and leave requests are recorded.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use pulse_link::models::{HeartbeatRequest, LeaveRequest, SubscribeRequest};
use pulse_link::{
    ListenerEvent, ListenerEvents, PulseClient, PulseConfig, PulseLinkError,
    ReconnectionPolicyKind, Result, StatusCategory, StatusEvent, SubscribeEvent, Transport,
};
use serde_json::{json, Value as JsonValue};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::timeout;

/// Upper bound for any single wait in the tests.
pub const WAIT: Duration = Duration::from_secs(5);

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ── mock transport ────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<Result<Bytes>>>,
    pushed: Notify,
    subscribes: Mutex<Vec<SubscribeRequest>>,
    subscribe_seen: Notify,
    heartbeats: Mutex<Vec<HeartbeatRequest>>,
    heartbeat_failures: Mutex<VecDeque<PulseLinkError>>,
    leaves: Mutex<Vec<LeaveRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a successful long-poll body.
    pub fn push_body(&self, body: String) {
        self.script.lock().push_back(Ok(Bytes::from(body)));
        self.pushed.notify_one();
    }

    /// Queue a failed long-poll.
    pub fn push_error(&self, error: PulseLinkError) {
        self.script.lock().push_back(Err(error));
        self.pushed.notify_one();
    }

    /// Make the next heartbeat fail with `error`.
    pub fn fail_next_heartbeat(&self, error: PulseLinkError) {
        self.heartbeat_failures.lock().push_back(error);
    }

    pub fn subscribe_requests(&self) -> Vec<SubscribeRequest> {
        self.subscribes.lock().clone()
    }

    pub fn heartbeat_requests(&self) -> Vec<HeartbeatRequest> {
        self.heartbeats.lock().clone()
    }

    pub fn leave_requests(&self) -> Vec<LeaveRequest> {
        self.leaves.lock().clone()
    }

    /// Wait until at least `count` long-polls have been issued.
    pub async fn wait_for_subscribes(&self, count: usize) -> Vec<SubscribeRequest> {
        timeout(WAIT, async {
            loop {
                let seen = self.subscribe_seen.notified();
                if self.subscribes.lock().len() >= count {
                    return self.subscribe_requests();
                }
                seen.await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "expected {} long-poll(s), saw {}",
                count,
                self.subscribes.lock().len()
            )
        })
    }

    /// Wait until at least `count` leave requests have been sent.
    pub async fn wait_for_leaves(&self, count: usize) -> Vec<LeaveRequest> {
        timeout(WAIT, async {
            while self.leaves.lock().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            self.leave_requests()
        })
        .await
        .expect("leave request not sent")
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn subscribe(&self, request: &SubscribeRequest) -> Result<Bytes> {
        self.subscribes.lock().push(request.clone());
        self.subscribe_seen.notify_one();
        loop {
            let pushed = self.pushed.notified();
            if let Some(next) = self.script.lock().pop_front() {
                return next;
            }
            pushed.await;
        }
    }

    async fn heartbeat(&self, request: &HeartbeatRequest) -> Result<()> {
        self.heartbeats.lock().push(request.clone());
        match self.heartbeat_failures.lock().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn leave(&self, request: &LeaveRequest) -> Result<()> {
        self.leaves.lock().push(request.clone());
        Ok(())
    }
}

// ── clients ───────────────────────────────────────────────────────────────────

/// Config with fast linear retries and heartbeats disabled.
pub fn fast_config() -> PulseConfig {
    PulseConfig::new("sub-c-test", "tester")
        .with_heartbeat_interval_secs(0)
        .with_reconnection_policy(ReconnectionPolicyKind::Linear)
        .with_reconnection_base_delay_ms(10)
        .with_max_reconnection_retries(-1)
}

pub fn client_with(transport: &Arc<MockTransport>, config: PulseConfig) -> PulseClient {
    init_logger();
    PulseClient::builder()
        .config(config)
        .transport(transport.clone())
        .build()
        .expect("client should build")
}

// ── envelopes ─────────────────────────────────────────────────────────────────

pub fn envelope(cursor: u64, items: Vec<JsonValue>) -> String {
    json!({
        "t": { "t": cursor.to_string(), "r": 1 },
        "m": items,
    })
    .to_string()
}

pub fn message_item(channel: &str, published: u64, payload: JsonValue) -> JsonValue {
    json!({
        "a": "1",
        "c": channel,
        "d": payload,
        "i": "publisher-1",
        "k": "sub-c-test",
        "p": { "t": published.to_string(), "r": 1 },
    })
}

pub fn presence_item(channel: &str, published: u64, action: &str, uuid: &str) -> JsonValue {
    json!({
        "a": "1",
        "c": format!("{}-pnpres", channel),
        "d": { "action": action, "uuid": uuid, "occupancy": 2, "timestamp": 1700000000 },
        "k": "sub-c-test",
        "p": { "t": published.to_string(), "r": 1 },
    })
}

// ── listener helpers ──────────────────────────────────────────────────────────

/// Next status from `events`, failing the test after [`WAIT`].
pub async fn next_status(events: &mut ListenerEvents) -> StatusEvent {
    timeout(WAIT, events.next_status())
        .await
        .expect("timed out waiting for a status")
        .expect("listener closed")
}

/// Skip statuses until one with `category` arrives.
pub async fn wait_status(events: &mut ListenerEvents, category: StatusCategory) -> StatusEvent {
    loop {
        let status = next_status(events).await;
        if status.category == category {
            return status;
        }
    }
}

pub async fn next_event(events: &mut ListenerEvents) -> SubscribeEvent {
    timeout(WAIT, events.next_event())
        .await
        .expect("timed out waiting for an event")
        .expect("listener closed")
}

/// Everything already queued in the mailbox.
pub fn drain(events: &mut ListenerEvents) -> Vec<ListenerEvent> {
    std::iter::from_fn(|| events.try_recv()).collect()
}

pub fn statuses(items: &[ListenerEvent]) -> Vec<StatusCategory> {
    items
        .iter()
        .filter_map(|item| match item {
            ListenerEvent::Status(status) => Some(status.category),
            ListenerEvent::Event(_) => None,
        })
        .collect()
}
