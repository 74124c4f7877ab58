//! Cross-tab fan-out of transient events.
//!
//! Delivery is best-effort: a tab whose receiver is gone is pruned and its
//! message dropped. Nothing is queued for tabs that register later.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use synapse_core::{ContextId, RelayMessage};

/// Point-to-point and broadcast delivery of [`RelayMessage`]s to tabs.
#[derive(Default)]
pub struct BroadcastRelay {
    tabs: Mutex<HashMap<ContextId, mpsc::UnboundedSender<RelayMessage>>>,
}

impl BroadcastRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `tab`, replacing any previous one.
    pub fn register(&self, tab: ContextId) -> mpsc::UnboundedReceiver<RelayMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut tabs) = self.tabs.lock() {
            tabs.insert(tab, tx);
        }
        debug!(context_id = %tab, "Relay listener registered");
        rx
    }

    pub fn unregister(&self, tab: ContextId) {
        if let Ok(mut tabs) = self.tabs.lock() {
            tabs.remove(&tab);
        }
    }

    /// Send to one tab. Returns `false` when the tab has no live listener.
    pub fn send_to(&self, tab: ContextId, message: RelayMessage) -> bool {
        let Ok(mut tabs) = self.tabs.lock() else {
            return false;
        };
        let Some(tx) = tabs.get(&tab) else {
            return false;
        };
        if tx.send(message).is_ok() {
            true
        } else {
            tabs.remove(&tab);
            trace!(context_id = %tab, "Pruned dead relay listener");
            false
        }
    }

    /// Send to every live tab, returning how many received the message.
    pub fn broadcast(&self, message: RelayMessage) -> usize {
        let Ok(mut tabs) = self.tabs.lock() else {
            return 0;
        };
        let event_type = message.event_type();
        let mut delivered = 0;
        tabs.retain(|_, tx| {
            let alive = tx.send(message.clone()).is_ok();
            delivered += usize::from(alive);
            alive
        });
        debug!(event_type, delivered, "Relay broadcast");
        delivered
    }

    /// Number of registered tabs, live or not yet pruned.
    pub fn listener_count(&self) -> usize {
        self.tabs.lock().map(|t| t.len()).unwrap_or(0)
    }
}
