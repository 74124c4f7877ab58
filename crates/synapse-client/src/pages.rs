//! Page summarization endpoint on the knowledge-graph service.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, instrument};

use synapse_core::{PageSaver, Result, SavePageResponse, SyncConfig};

use crate::http::ApiClient;

const SUMMARIZE_PATH: &str = "/ai/api/v1/agents/summarize";

#[derive(Serialize)]
struct SummarizeRequest<'a> {
    data: &'a [String],
}

/// [`PageSaver`] that posts collected URLs to the summarize agent.
pub struct HttpPageSaver {
    api: Arc<ApiClient>,
    endpoint: String,
}

impl HttpPageSaver {
    pub fn new(api: Arc<ApiClient>, kg_base_url: &str) -> Self {
        Self {
            api,
            endpoint: format!("{}{}", kg_base_url.trim_end_matches('/'), SUMMARIZE_PATH),
        }
    }

    pub fn from_config(api: Arc<ApiClient>, config: &SyncConfig) -> Self {
        Self::new(api, &config.kg_api_base_url)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl PageSaver for HttpPageSaver {
    #[instrument(skip(self, urls), fields(subsystem = "client", component = "pages", item_count = urls.len()))]
    async fn save_pages(&self, urls: &[String]) -> Result<SavePageResponse> {
        let response: SavePageResponse = self
            .api
            .post_external(&self.endpoint, &SummarizeRequest { data: urls })
            .await?;
        info!(success = response.success, note_id = ?response.note_id, "Pages submitted");
        Ok(response)
    }
}
