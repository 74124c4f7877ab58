//! Local-only fallback storage for drafts.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use synapse_core::defaults::DEGRADED_DRAFT_PREFIX;
use synapse_core::{DegradedDraftStore, Draft, KeyedStore, Result};

/// Keeps degraded draft copies under `draft:<id>` keys of a [`KeyedStore`].
pub struct KeyedDegradedStore {
    store: Arc<dyn KeyedStore>,
}

impl KeyedDegradedStore {
    pub fn new(store: Arc<dyn KeyedStore>) -> Self {
        Self { store }
    }

    pub fn key_for(id: Uuid) -> String {
        format!("{}{}", DEGRADED_DRAFT_PREFIX, id)
    }
}

#[async_trait]
impl DegradedDraftStore for KeyedDegradedStore {
    async fn save(&self, draft: &Draft) -> Result<()> {
        let key = Self::key_for(draft.id);
        self.store
            .set_one(&key, serde_json::to_value(draft)?)
            .await?;
        debug!(draft_id = %draft.id, store_key = %key, "Degraded draft copy saved");
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Option<Draft>> {
        match self.store.get_one(&Self::key_for(id)).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn remove(&self, id: Uuid) -> Result<()> {
        self.store.remove(&[Self::key_for(id).as_str()]).await
    }
}
