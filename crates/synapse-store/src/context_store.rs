//! Per-context handle onto the shared medium.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use synapse_core::{ChangeReceiver, ContextId, KeyedStore, Result};

use crate::StorageMedium;

/// [`KeyedStore`] bound to one execution context.
///
/// Writes are tagged with this context's id; [`KeyedStore::subscribe`]
/// yields only changes made by other contexts.
#[derive(Clone)]
pub struct ContextStore {
    medium: Arc<StorageMedium>,
    id: ContextId,
}

impl ContextStore {
    pub fn new(medium: Arc<StorageMedium>, id: ContextId) -> Self {
        Self { medium, id }
    }

    pub fn medium(&self) -> &Arc<StorageMedium> {
        &self.medium
    }
}

impl std::fmt::Debug for ContextStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextStore").field("id", &self.id).finish()
    }
}

#[async_trait]
impl KeyedStore for ContextStore {
    fn context_id(&self) -> ContextId {
        self.id
    }

    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        Ok(self.medium.read(keys).await)
    }

    async fn set(&self, items: HashMap<String, Value>) -> Result<()> {
        let key_count = items.len();
        self.medium.write(self.id, items).await?;
        debug!(context_id = %self.id, key_count, "KeyedStore set");
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        self.medium.delete(self.id, keys).await?;
        debug!(context_id = %self.id, key_count = keys.len(), "KeyedStore remove");
        Ok(())
    }

    fn subscribe(&self) -> ChangeReceiver {
        ChangeReceiver::new(self.medium.raw_subscribe(), Some(self.id))
    }
}
