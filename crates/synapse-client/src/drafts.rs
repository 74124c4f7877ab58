//! Remote ephemeral draft cache.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};
use uuid::Uuid;

use synapse_core::{Draft, DraftCache, DraftList, DraftRequest, Error, Result};
use synapse_core::logging::VERSION;

use crate::http::ApiClient;

const DRAFTS_PATH: &str = "/api/drafts";

/// [`DraftCache`] backed by the `/api/drafts` endpoints.
pub struct HttpDraftCache {
    api: Arc<ApiClient>,
}

impl HttpDraftCache {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl DraftCache for HttpDraftCache {
    #[instrument(skip(self, request), fields(subsystem = "client", component = "drafts", draft_id = ?request.id))]
    async fn save(&self, request: &DraftRequest) -> Result<Draft> {
        let draft: Option<Draft> = self.api.post(DRAFTS_PATH, request).await?;
        let draft = draft.ok_or_else(|| Error::Request("draft save returned no data".into()))?;
        debug!({ VERSION } = draft.version, "Draft cached");
        Ok(draft)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Draft>> {
        match self.api.get(&format!("{}/{}", DRAFTS_PATH, id)).await {
            Ok(draft) => Ok(draft),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.api.delete(&format!("{}/{}", DRAFTS_PATH, id)).await
    }

    async fn list(&self) -> Result<DraftList> {
        Ok(self.api.get(DRAFTS_PATH).await?.unwrap_or_default())
    }
}
