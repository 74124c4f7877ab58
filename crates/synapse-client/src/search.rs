//! Note search with a short-lived result cache.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use synapse_core::defaults::SEARCH_PAGE_SIZE;
use synapse_core::logging::ITEM_COUNT;
use synapse_core::{Cache, Error, Result, SearchPage, SyncConfig};

use crate::http::ApiClient;

const SEARCH_PATH: &str = "/api/notes/search";

/// Searches notes and memoizes the first page per keyword.
pub struct NoteSearchClient {
    api: Arc<ApiClient>,
    cache: Cache<String, SearchPage>,
}

impl NoteSearchClient {
    pub fn new(api: Arc<ApiClient>, capacity: usize, ttl: Duration) -> Self {
        Self {
            api,
            cache: Cache::new(capacity, ttl),
        }
    }

    pub fn from_config(api: Arc<ApiClient>, config: &SyncConfig) -> Self {
        Self::new(api, config.search_cache_capacity, config.search_cache_ttl())
    }

    /// Cache key for `keyword`, or `None` when it is blank.
    pub fn cache_key(keyword: &str) -> Option<String> {
        let key = keyword.trim().to_lowercase();
        (!key.is_empty()).then_some(key)
    }

    #[instrument(skip(self), fields(subsystem = "client", component = "search"))]
    pub async fn search(&self, keyword: &str) -> Result<SearchPage> {
        let key = Self::cache_key(keyword)
            .ok_or_else(|| Error::InvalidInput("search keyword is empty".into()))?;

        if let Some(page) = self.cache.get(&key) {
            debug!({ ITEM_COUNT } = page.results.len(), "Search cache hit");
            return Ok(page);
        }

        let query = [
            ("keyword", keyword.trim().to_string()),
            ("page", "0".to_string()),
            ("size", SEARCH_PAGE_SIZE.to_string()),
        ];
        let page: SearchPage = self
            .api
            .get_query(SEARCH_PATH, &query)
            .await?
            .unwrap_or_default();
        debug!(
            { ITEM_COUNT } = page.results.len(),
            total = page.total_count,
            "Search completed"
        );
        self.cache.insert(key, page.clone());
        Ok(page)
    }

    pub fn invalidate(&self) {
        self.cache.clear();
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}
