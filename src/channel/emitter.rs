//! In-process pub/sub channel.
//!
//! `EventBus` delivers through a single pump task fed by a FIFO queue, so
//! `dispatch` returns before any handler runs and a handler is never
//! re-entered synchronously by the dispatch that triggered it. Handlers
//! for one event fire in registration order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use super::{Channel, Listener, ListenerId};

/// Listener registry keyed by event name, preserving registration order.
#[derive(Default)]
pub(crate) struct ListenerTable {
    entries: RwLock<HashMap<String, Vec<(ListenerId, Listener)>>>,
    next: AtomicU64,
}

impl ListenerTable {
    pub(crate) fn insert(&self, event: &str, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next.fetch_add(1, Ordering::Relaxed));
        let mut entries = self.entries.write().unwrap();
        entries
            .entry(event.to_string())
            .or_default()
            .push((id, listener));
        id
    }

    pub(crate) fn remove(&self, event: &str, id: ListenerId) -> bool {
        let mut entries = self.entries.write().unwrap();
        match entries.get_mut(event) {
            Some(listeners) => {
                let before = listeners.len();
                listeners.retain(|(entry, _)| *entry != id);
                listeners.len() != before
            }
            None => false,
        }
    }

    pub(crate) fn clear(&self, event: Option<&str>) {
        let mut entries = self.entries.write().unwrap();
        match event {
            Some(event) => {
                entries.remove(event);
            }
            None => entries.clear(),
        }
    }

    /// Snapshot of the listeners for one event, in registration order.
    pub(crate) fn snapshot(&self, event: &str) -> Vec<Listener> {
        let entries = self.entries.read().unwrap();
        entries
            .get(event)
            .map(|listeners| listeners.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default()
    }
}

enum BusMessage {
    Deliver(String, Value),
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// In-process channel with deferred, ordered delivery.
///
/// Must be created inside a tokio runtime; delivery runs on a spawned
/// pump task.
pub struct EventBus {
    name: String,
    listeners: Arc<ListenerTable>,
    queue: mpsc::UnboundedSender<BusMessage>,
    closed: AtomicBool,
}

impl EventBus {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let listeners = Arc::new(ListenerTable::default());
        let (queue, mut rx) = mpsc::unbounded_channel();

        let pump_table = listeners.clone();
        let pump_name = name.clone();
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match message {
                    BusMessage::Deliver(event, args) => {
                        for listener in pump_table.snapshot(&event) {
                            listener(args.clone());
                        }
                    }
                    BusMessage::Flush(ack) => {
                        let _ = ack.send(());
                    }
                    BusMessage::Shutdown => break,
                }
            }
            tracing::trace!(bus = %pump_name, "event bus pump stopped");
        });

        Self {
            name,
            listeners,
            queue,
            closed: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Waits until every dispatch issued before this call has been
    /// delivered. The queue is FIFO, so a flush marker reaching the pump
    /// means all earlier deliveries ran.
    pub async fn settle(&self) {
        let (tx, rx) = oneshot::channel();
        if self.queue.send(BusMessage::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

impl Channel for EventBus {
    fn subscribe(&self, event: &str, listener: Listener) -> ListenerId {
        self.listeners.insert(event, listener)
    }

    fn unsubscribe(&self, event: &str, id: ListenerId) -> bool {
        self.listeners.remove(event, id)
    }

    fn unsubscribe_all(&self, event: Option<&str>) {
        self.listeners.clear(event);
    }

    fn dispatch(&self, event: &str, args: Value) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        self.queue
            .send(BusMessage::Deliver(event.to_string(), args))
            .is_ok()
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.listeners.clear(None);
        let _ = self.queue.send(BusMessage::Shutdown);
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        self.close();
    }
}
