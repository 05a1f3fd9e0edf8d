//! Registry of listeners attached to one client.
//!
//! Membership changes take the write lock; fan-out clones a snapshot under the
//! read lock and delivers without holding it. Each entry carries its own
//! `active` flag, checked under a mutex at delivery time, so once
//! [`ListenerRegistry::remove`] returns no snapshot taken earlier can still
//! reach the removed listener.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

use crate::listener::{Delivery, Listener, ListenerEvent};
use crate::models::{StatusEvent, SubscribeEvent};

/// Log every n-th drop per listener after the first.
const DROP_LOG_EVERY: u64 = 100;

struct Entry {
    listener: Listener,
    active: Mutex<bool>,
}

impl Entry {
    fn deliver(&self, event: ListenerEvent) -> Delivery {
        let active = self.active.lock();
        if !*active {
            return Delivery::Closed;
        }
        self.listener.try_deliver(event)
    }

    fn deactivate(&self) {
        *self.active.lock() = false;
    }
}

/// Listeners registered with a client, in registration order.
#[derive(Default)]
pub struct ListenerRegistry {
    entries: RwLock<Vec<Arc<Entry>>>,
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener`; returns false if it was already registered.
    pub fn add(&self, listener: &Listener) -> bool {
        let mut entries = self.entries.write();
        if entries.iter().any(|e| e.listener == *listener) {
            return false;
        }
        entries.push(Arc::new(Entry {
            listener: listener.clone(),
            active: Mutex::new(true),
        }));
        log::debug!("[pulse-link] Listener {} added ({} total)", listener.id(), entries.len());
        true
    }

    /// Unregister `listener`; returns false if it was not registered.
    ///
    /// After this returns the listener receives nothing further from this
    /// registry, including fan-outs that were already in progress.
    pub fn remove(&self, listener: &Listener) -> bool {
        let removed = {
            let mut entries = self.entries.write();
            let position = entries.iter().position(|e| e.listener == *listener);
            position.map(|index| entries.remove(index))
        };
        match removed {
            Some(entry) => {
                entry.deactivate();
                log::debug!("[pulse-link] Listener {} removed", listener.id());
                true
            },
            None => false,
        }
    }

    /// Unregister every listener.
    pub fn clear(&self) {
        let drained: Vec<Arc<Entry>> = self.entries.write().drain(..).collect();
        for entry in drained {
            entry.deactivate();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn contains(&self, listener: &Listener) -> bool {
        self.entries.read().iter().any(|e| e.listener == *listener)
    }

    /// Deliver a status to every listener.
    pub fn broadcast_status(&self, status: &StatusEvent) {
        self.broadcast(|| ListenerEvent::Status(status.clone()));
    }

    /// Deliver a subscribe event to every listener.
    pub fn broadcast_event(&self, event: &SubscribeEvent) {
        self.broadcast(|| ListenerEvent::Event(event.clone()));
    }

    fn broadcast(&self, make: impl Fn() -> ListenerEvent) {
        let snapshot: Vec<Arc<Entry>> = self.entries.read().clone();
        for entry in snapshot {
            match entry.deliver(make()) {
                Delivery::Delivered => {},
                Delivery::Dropped => {
                    let dropped = entry.listener.dropped_count();
                    if dropped == 1 || dropped % DROP_LOG_EVERY == 0 {
                        log::warn!(
                            "[pulse-link] Listener {} mailbox full, {} item(s) dropped so far",
                            entry.listener.id(),
                            dropped
                        );
                    }
                },
                Delivery::Closed => {
                    log::debug!(
                        "[pulse-link] Listener {} is closed, skipping delivery",
                        entry.listener.id()
                    );
                },
            }
        }
    }
}
