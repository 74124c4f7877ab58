//! Change notifications and cross-context messages.
//!
//! Two kinds of traffic connect execution contexts:
//!
//! - [`StorageChange`]: emitted by the storage medium once per committed
//!   write, fanned out to every context except the writer.
//! - [`RelayMessage`]: transient progress events pushed tab-to-tab without
//!   touching storage.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::uuid_utils::new_v7;

/// Identity of one execution context (tab, background worker, overlay).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextId(Uuid);

impl ContextId {
    /// Fresh, time-ordered context identity.
    pub fn new() -> Self {
        Self(new_v7())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ContextId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A committed write to one KeyedStore key.
///
/// `new_value` is `None` when the key was removed; `old_value` is `None`
/// when the key did not exist before.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageChange {
    pub key: String,
    pub new_value: Option<Value>,
    pub old_value: Option<Value>,
    pub origin: ContextId,
}

/// Per-context view of the medium's change stream.
///
/// Changes written by the owning context are skipped, so every other
/// context observes each committed write exactly once. A receiver that falls
/// behind the channel capacity continues with the next retained change and
/// counts the gap; consumers check [`ChangeReceiver::take_lagged`] and
/// re-read the store through `get`.
pub struct ChangeReceiver {
    rx: broadcast::Receiver<StorageChange>,
    exclude: Option<ContextId>,
    lagged: u64,
}

impl ChangeReceiver {
    pub fn new(rx: broadcast::Receiver<StorageChange>, exclude: Option<ContextId>) -> Self {
        Self {
            rx,
            exclude,
            lagged: 0,
        }
    }

    /// Changes dropped since the last call.
    pub fn take_lagged(&mut self) -> u64 {
        std::mem::take(&mut self.lagged)
    }

    /// Next change from another context, or `None` once the medium is gone.
    pub async fn recv(&mut self) -> Option<StorageChange> {
        loop {
            match self.rx.recv().await {
                Ok(change) if Some(change.origin) == self.exclude => continue,
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Change receiver lagged, changes dropped");
                    self.lagged += skipped;
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`ChangeReceiver::recv`].
    pub fn try_recv(&mut self) -> Option<StorageChange> {
        loop {
            match self.rx.try_recv() {
                Ok(change) if Some(change.origin) == self.exclude => continue,
                Ok(change) => return Some(change),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Change receiver lagged, changes dropped");
                    self.lagged += skipped;
                    continue;
                }
                Err(_) => return None,
            }
        }
    }
}

/// Transient cross-tab event delivered by the broadcast relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayMessage {
    /// A page save batch was submitted.
    BatchStarted {
        batch_id: String,
        batch_timestamp: i64,
        urls: Vec<String>,
    },
    /// A page save batch finished.
    BatchCompleted {
        batch_id: String,
        urls: Vec<String>,
        success: bool,
        error: Option<String>,
    },
    /// The session was established or cleared.
    AuthChanged { authenticated: bool },
}

impl RelayMessage {
    /// Short event name for logs.
    pub fn event_type(&self) -> &'static str {
        match self {
            RelayMessage::BatchStarted { .. } => "batch_started",
            RelayMessage::BatchCompleted { .. } => "batch_completed",
            RelayMessage::AuthChanged { .. } => "auth_changed",
        }
    }
}
