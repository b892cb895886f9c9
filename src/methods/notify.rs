//! Debounced change broadcast.
//!
//! Every graph mutation lands here through [`ChangeSink`]. Instead of
//! dispatching per mutation, the notifier arms one timer per quiet window
//! and emits a single payload-free `update` event when it fires. The panel
//! re-queries on its own schedule, so collapsed notices lose nothing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::trace;

use crate::channel::Channel;
use crate::graph::ChangeSink;

/// Event carrying graph-change notices to subscribers.
pub const UPDATE_EVENT: &str = "update";

/// Default quiet window between a mutation and the broadcast.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

pub struct UpdateNotifier {
    channel: Arc<dyn Channel>,
    window: Duration,
    armed: Arc<AtomicBool>,
}

impl UpdateNotifier {
    pub fn new(channel: Arc<dyn Channel>, window: Duration) -> Arc<Self> {
        Arc::new(Self {
            channel,
            window,
            armed: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl ChangeSink for UpdateNotifier {
    fn graph_changed(&self) {
        // One timer per window. Later mutations inside the window coalesce.
        if self.armed.swap(true, Ordering::AcqRel) {
            trace!("update notice coalesced into armed window");
            return;
        }
        let channel = Arc::clone(&self.channel);
        let armed = Arc::clone(&self.armed);
        let window = self.window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            // Disarm before dispatching so a mutation racing the broadcast
            // opens a fresh window instead of being lost.
            armed.store(false, Ordering::Release);
            if !channel.dispatch(UPDATE_EVENT, Value::Null) {
                trace!("update notice dropped, channel closed");
            }
        });
    }
}
