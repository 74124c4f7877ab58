//! Typed re-dispatch of storage changes.
//!
//! The [`ChangeBus`] listens to one context's raw change stream and
//! re-emits changes to the well-known collection keys as decoded
//! [`CollectionChange`] values. Per-key order is preserved and nothing is
//! deduplicated: two writes to the same key produce two events. When the raw
//! stream drops changes the bus emits [`CollectionChange::Resync`].

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use synapse_core::defaults::{
    CHANGE_BUS_CAPACITY, KEY_COLLECTED_PAGES, KEY_OVERLAY_STATE, KEY_PENDING_SNIPPETS,
    KEY_SAVE_REQUESTS,
};
use synapse_core::{KeyedStore, OverlayState, PendingTextSnippet, SaveRequest, StorageChange};

/// A collection value written by another context.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionChange {
    Pages(Vec<String>),
    Snippets(Vec<PendingTextSnippet>),
    SaveRequests(Vec<SaveRequest>),
    Overlay(OverlayState),
    /// Changes were dropped upstream; reload every collection from the store.
    Resync,
}

impl CollectionChange {
    /// Decode a raw change. Unknown keys yield `None`; a removed key decodes
    /// as the empty collection (or the default overlay state).
    pub fn decode(change: &StorageChange) -> Option<Self> {
        let value = change.new_value.clone().unwrap_or(Value::Null);
        let decoded = match change.key.as_str() {
            KEY_COLLECTED_PAGES => decode_list(value).map(CollectionChange::Pages),
            KEY_PENDING_SNIPPETS => decode_list(value).map(CollectionChange::Snippets),
            KEY_SAVE_REQUESTS => decode_list(value).map(CollectionChange::SaveRequests),
            KEY_OVERLAY_STATE => {
                if value.is_null() {
                    Ok(CollectionChange::Overlay(OverlayState::default()))
                } else {
                    serde_json::from_value(value).map(CollectionChange::Overlay)
                }
            }
            _ => return None,
        };
        match decoded {
            Ok(change) => Some(change),
            Err(e) => {
                warn!(store_key = %change.key, error = %e, "Dropping undecodable change");
                None
            }
        }
    }

    /// Store key the change belongs to; `None` for [`CollectionChange::Resync`].
    pub fn key(&self) -> Option<&'static str> {
        match self {
            CollectionChange::Pages(_) => Some(KEY_COLLECTED_PAGES),
            CollectionChange::Snippets(_) => Some(KEY_PENDING_SNIPPETS),
            CollectionChange::SaveRequests(_) => Some(KEY_SAVE_REQUESTS),
            CollectionChange::Overlay(_) => Some(KEY_OVERLAY_STATE),
            CollectionChange::Resync => None,
        }
    }
}

fn decode_list<T: serde::de::DeserializeOwned>(value: Value) -> serde_json::Result<Vec<T>> {
    if value.is_null() {
        Ok(Vec::new())
    } else {
        serde_json::from_value(value)
    }
}

/// Broadcast bus of typed collection changes for one context.
pub struct ChangeBus {
    tx: broadcast::Sender<CollectionChange>,
}

impl ChangeBus {
    /// Create a new bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Create a bus fed by `store`'s change stream. The task ends when the
    /// underlying medium is dropped.
    pub fn spawn(store: &dyn KeyedStore) -> (Arc<Self>, JoinHandle<()>) {
        let bus = Arc::new(Self::new(CHANGE_BUS_CAPACITY));
        let mut changes = store.subscribe();
        let context_id = store.context_id();
        let forward = Arc::clone(&bus);
        let handle = tokio::spawn(async move {
            while let Some(change) = changes.recv().await {
                forward.dispatch(&change);
                let skipped = changes.take_lagged();
                if skipped > 0 {
                    forward.resync(skipped);
                }
            }
            debug!(context_id = %context_id, "ChangeBus stopped");
        });
        (bus, handle)
    }

    /// Decode and re-emit one raw change. Returns whether it was emitted.
    pub fn dispatch(&self, change: &StorageChange) -> bool {
        let Some(typed) = CollectionChange::decode(change) else {
            return false;
        };
        trace!(
            store_key = typed.key().unwrap_or_default(),
            context_id = %change.origin,
            subscriber_count = self.tx.receiver_count(),
            "ChangeBus emit"
        );
        let _ = self.tx.send(typed);
        true
    }

    /// Tell subscribers that `skipped` raw changes never reached them.
    pub fn resync(&self, skipped: u64) {
        debug!(skipped, "ChangeBus requesting resync");
        let _ = self.tx.send(CollectionChange::Resync);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CollectionChange> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use synapse_core::ContextId;

    fn raw(key: &str, value: Option<Value>) -> StorageChange {
        StorageChange {
            key: key.to_string(),
            new_value: value,
            old_value: None,
            origin: ContextId::new(),
        }
    }

    #[test]
    fn test_decode_known_keys() {
        let pages = CollectionChange::decode(&raw(KEY_COLLECTED_PAGES, Some(json!(["u"]))));
        assert_eq!(pages, Some(CollectionChange::Pages(vec!["u".into()])));

        let overlay = CollectionChange::decode(&raw(KEY_OVERLAY_STATE, Some(json!("hidden"))));
        assert_eq!(overlay, Some(CollectionChange::Overlay(OverlayState::Hidden)));
    }

    #[test]
    fn test_decode_removed_key_is_empty() {
        let pages = CollectionChange::decode(&raw(KEY_COLLECTED_PAGES, None));
        assert_eq!(pages, Some(CollectionChange::Pages(vec![])));
        let overlay = CollectionChange::decode(&raw(KEY_OVERLAY_STATE, None));
        assert_eq!(overlay, Some(CollectionChange::Overlay(OverlayState::Expanded)));
    }

    #[test]
    fn test_decode_ignores_unknown_and_malformed() {
        assert!(CollectionChange::decode(&raw("access_token", Some(json!("t")))).is_none());
        assert!(CollectionChange::decode(&raw(KEY_COLLECTED_PAGES, Some(json!(3)))).is_none());
    }

    #[test]
    fn test_dispatch_does_not_deduplicate() {
        let bus = ChangeBus::new(8);
        let mut rx = bus.subscribe();
        let change = raw(KEY_COLLECTED_PAGES, Some(json!(["u"])));

        assert!(bus.dispatch(&change));
        assert!(bus.dispatch(&change));

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_resync_is_broadcast_without_key() {
        let bus = ChangeBus::new(8);
        let mut rx = bus.subscribe();

        bus.resync(4);

        let change = rx.try_recv().unwrap();
        assert_eq!(change, CollectionChange::Resync);
        assert_eq!(change.key(), None);
    }
}
