//! Listeners: the caller side of event fan-out.
//!
//! A [`Listener`] is a cheap, cloneable handle registered with a client; the
//! matching [`ListenerEvents`] is the bounded mailbox the caller drains.
//! Delivery into the mailbox never waits: when it is full the item is dropped
//! for that listener only and counted in [`Listener::dropped_count`]. The next
//! delivery that finds room is preceded by a `RequestMessageCountExceeded`
//! status, so the caller learns about the loss from the mailbox itself.

pub mod registry;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::event_handlers::EventHandlers;
use crate::models::{StatusCategory, StatusEvent, StatusOperation, SubscribeEvent};

pub use registry::ListenerRegistry;

/// Mailbox size used by [`Listener::new`].
pub const DEFAULT_LISTENER_CAPACITY: usize = 1000;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// One item in a listener's mailbox.
#[derive(Debug, Clone, PartialEq)]
pub enum ListenerEvent {
    Status(StatusEvent),
    Event(SubscribeEvent),
}

/// Result of a non-blocking delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Delivered,
    /// Mailbox full; the item was dropped and counted
    Dropped,
    /// The receiving half is gone
    Closed,
}

struct ListenerInner {
    sender: mpsc::Sender<ListenerEvent>,
    dropped: AtomicU64,
    /// Items were dropped since the last overflow status went out
    overflowed: AtomicBool,
}

/// Handle registered with [`PulseClient::add_listener`](crate::PulseClient::add_listener).
#[derive(Clone)]
pub struct Listener {
    id: u64,
    inner: Arc<ListenerInner>,
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("dropped", &self.dropped_count())
            .finish()
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Listener {}

impl Listener {
    /// Create a listener with the default mailbox size.
    pub fn new() -> (Listener, ListenerEvents) {
        Self::with_capacity(DEFAULT_LISTENER_CAPACITY)
    }

    /// Create a listener whose mailbox holds at most `capacity` items
    /// (values below 1 are raised to 1).
    pub fn with_capacity(capacity: usize) -> (Listener, ListenerEvents) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let listener = Listener {
            id: NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed),
            inner: Arc::new(ListenerInner {
                sender,
                dropped: AtomicU64::new(0),
                overflowed: AtomicBool::new(false),
            }),
        };
        (listener, ListenerEvents { receiver })
    }

    /// Create a listener that runs `handlers` for every item.
    ///
    /// The mailbox is drained by a task spawned on the current tokio runtime;
    /// the task ends once every clone of the listener is dropped.
    pub fn with_handlers(handlers: EventHandlers) -> Listener {
        Self::with_handlers_and_capacity(handlers, DEFAULT_LISTENER_CAPACITY)
    }

    /// [`Listener::with_handlers`] with an explicit mailbox size.
    pub fn with_handlers_and_capacity(handlers: EventHandlers, capacity: usize) -> Listener {
        let (listener, mut events) = Self::with_capacity(capacity);
        let id = listener.id;
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                handlers.dispatch(event);
            }
            log::debug!("[pulse-link] Callback listener {} drained and stopped", id);
        });
        listener
    }

    /// Process-unique identifier of this listener.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Items dropped because the mailbox was full.
    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Whether the receiving half has been dropped.
    pub fn is_closed(&self) -> bool {
        self.inner.sender.is_closed()
    }

    pub(crate) fn try_deliver(&self, event: ListenerEvent) -> Delivery {
        if self.inner.overflowed.swap(false, Ordering::AcqRel) {
            match self.inner.sender.try_send(self.overflow_status()) {
                Ok(()) => {},
                Err(mpsc::error::TrySendError::Full(_)) => return self.record_drop(),
                Err(mpsc::error::TrySendError::Closed(_)) => return Delivery::Closed,
            }
        }
        match self.inner.sender.try_send(event) {
            Ok(()) => Delivery::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => self.record_drop(),
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    fn record_drop(&self) -> Delivery {
        self.inner.dropped.fetch_add(1, Ordering::Relaxed);
        self.inner.overflowed.store(true, Ordering::Release);
        Delivery::Dropped
    }

    fn overflow_status(&self) -> ListenerEvent {
        let mut status =
            StatusEvent::new(StatusCategory::RequestMessageCountExceeded, StatusOperation::Subscribe);
        status.error = Some(format!(
            "Listener mailbox full: {} item(s) dropped",
            self.dropped_count()
        ));
        ListenerEvent::Status(status)
    }
}

/// Receiving half of a listener's mailbox.
#[derive(Debug)]
pub struct ListenerEvents {
    receiver: mpsc::Receiver<ListenerEvent>,
}

impl ListenerEvents {
    /// Wait for the next item; `None` once the listener handle is gone and
    /// the mailbox is empty.
    pub async fn recv(&mut self) -> Option<ListenerEvent> {
        self.receiver.recv().await
    }

    /// Take the next item if one is queued.
    pub fn try_recv(&mut self) -> Option<ListenerEvent> {
        self.receiver.try_recv().ok()
    }

    /// Wait for the next status, skipping subscribe events.
    pub async fn next_status(&mut self) -> Option<StatusEvent> {
        loop {
            if let ListenerEvent::Status(status) = self.recv().await? {
                return Some(status);
            }
        }
    }

    /// Wait for the next subscribe event, skipping statuses.
    pub async fn next_event(&mut self) -> Option<SubscribeEvent> {
        loop {
            if let ListenerEvent::Event(event) = self.recv().await? {
                return Some(event);
            }
        }
    }
}
