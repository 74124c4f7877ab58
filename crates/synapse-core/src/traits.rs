//! Core traits for synapse abstractions.
//!
//! These traits define the seams between the sync layer and its
//! collaborators: the shared storage medium, the remote draft cache, the
//! durable note store, page summarization, and the unload beacon.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;
use crate::events::{ChangeReceiver, ContextId};
use crate::models::*;

// =============================================================================
// KEYED STORE
// =============================================================================

/// Persistent key-value store shared by every execution context.
///
/// Every write replaces whole values; the last `set` of a key wins. Each
/// committed write is announced once to every other context's
/// [`ChangeReceiver`]. A context started after a write observes the
/// persisted value through [`KeyedStore::get`].
#[async_trait]
pub trait KeyedStore: Send + Sync {
    /// Identity of the context this handle writes as.
    fn context_id(&self) -> ContextId;

    /// Read the given keys. Missing keys are absent from the result.
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>>;

    /// Write every entry of `items`. Fails if the medium is unavailable.
    async fn set(&self, items: HashMap<String, Value>) -> Result<()>;

    /// Remove the given keys. Fails if the medium is unavailable.
    async fn remove(&self, keys: &[&str]) -> Result<()>;

    /// Changes committed by other contexts, in commit order.
    fn subscribe(&self) -> ChangeReceiver;

    /// Read a single key.
    async fn get_one(&self, key: &str) -> Result<Option<Value>> {
        let mut values = self.get(&[key]).await?;
        Ok(values.remove(key))
    }

    /// Write a single key.
    async fn set_one(&self, key: &str, value: Value) -> Result<()> {
        let mut items = HashMap::with_capacity(1);
        items.insert(key.to_string(), value);
        self.set(items).await
    }
}

// =============================================================================
// REMOTE COLLABORATORS
// =============================================================================

/// Remote ephemeral cache for drafts with optimistic-locking versions.
#[async_trait]
pub trait DraftCache: Send + Sync {
    /// Create or update a draft. Returns the stored draft carrying the
    /// authoritative version. A stale `version` yields `Error::Conflict`.
    async fn save(&self, req: &DraftRequest) -> Result<Draft>;

    /// Fetch a draft, `None` if the cache holds no entry for `id`.
    async fn get(&self, id: Uuid) -> Result<Option<Draft>>;

    /// Delete a draft. Deleting a missing draft succeeds.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// List the current user's drafts.
    async fn list(&self) -> Result<DraftList>;
}

/// Durable note store.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Create a note directly, returning its server-assigned id.
    async fn create(&self, note: &NoteContent) -> Result<i64>;

    /// Fetch a note by id.
    async fn get(&self, id: i64) -> Result<Note>;

    /// Replace a note's title and content.
    async fn update(&self, id: i64, note: &NoteContent) -> Result<()>;

    /// Delete a note.
    async fn delete(&self, id: i64) -> Result<()>;

    /// Promote a cached draft into a note. `Error::Conflict` means another
    /// request is already promoting the same draft.
    async fn create_from_draft(&self, draft_id: Uuid) -> Result<i64>;
}

/// Summarization service that turns page URLs into notes.
#[async_trait]
pub trait PageSaver: Send + Sync {
    async fn save_pages(&self, urls: &[String]) -> Result<SavePageResponse>;
}

/// Fire-and-forget durable create used during teardown.
///
/// `send` must not block; it returns whether the request was dispatched,
/// never whether it was delivered.
pub trait BeaconSender: Send + Sync {
    fn send(&self, draft_id: Uuid, title: &str, content: &str) -> bool;
}

/// Local-only fallback copy of drafts that could not reach the cache.
#[async_trait]
pub trait DegradedDraftStore: Send + Sync {
    async fn save(&self, draft: &Draft) -> Result<()>;

    async fn load(&self, id: Uuid) -> Result<Option<Draft>>;

    async fn remove(&self, id: Uuid) -> Result<()>;
}
