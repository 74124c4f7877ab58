//! Environment-driven configuration for the sync layer.

use std::path::PathBuf;
use std::time::Duration;

use crate::defaults;

/// Configuration shared by the store, draft engine, and REST clients.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the REST backend (notes, drafts, auth, search).
    pub api_base_url: String,
    /// Base URL of the knowledge-graph service (page summarization).
    pub kg_api_base_url: String,
    /// File backing the shared storage medium.
    pub store_path: PathBuf,
    /// HTTP request timeout in seconds.
    pub http_timeout_secs: u64,
    /// Debounce delay before an edit reaches the ephemeral cache.
    pub debounce_ms: u64,
    /// Cache persists that force a durable promotion.
    pub batch_change_threshold: u32,
    /// Seconds since the last durable save that force a promotion.
    pub batch_interval_secs: u64,
    /// Delay before terminal save requests are removed.
    pub save_status_removal_ms: u64,
    /// Search result TTL in seconds.
    pub search_cache_ttl_secs: u64,
    /// Maximum memoized search keywords.
    pub search_cache_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: defaults::API_BASE_URL.to_string(),
            kg_api_base_url: defaults::KG_API_BASE_URL.to_string(),
            store_path: PathBuf::from(defaults::STORE_PATH),
            http_timeout_secs: defaults::HTTP_TIMEOUT_SECS,
            debounce_ms: defaults::DEBOUNCE_MS,
            batch_change_threshold: defaults::BATCH_CHANGE_THRESHOLD,
            batch_interval_secs: defaults::BATCH_INTERVAL_SECS,
            save_status_removal_ms: defaults::SAVE_STATUS_REMOVAL_MS,
            search_cache_ttl_secs: defaults::SEARCH_CACHE_TTL_SECS,
            search_cache_capacity: defaults::SEARCH_CACHE_CAPACITY,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl SyncConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `SYNAPSE_API_BASE_URL` | `http://localhost:8080` | REST backend |
    /// | `SYNAPSE_KG_API_BASE_URL` | `http://localhost:8000` | Summarization service |
    /// | `SYNAPSE_STORE_PATH` | `.synapse/store.json` | Storage medium file |
    /// | `SYNAPSE_HTTP_TIMEOUT_SECS` | `10` | HTTP timeout |
    /// | `SYNAPSE_DEBOUNCE_MS` | `500` | Autosave debounce |
    /// | `SYNAPSE_BATCH_CHANGE_THRESHOLD` | `50` | Changes before promotion |
    /// | `SYNAPSE_BATCH_INTERVAL_SECS` | `300` | Time before promotion |
    /// | `SYNAPSE_SAVE_STATUS_REMOVAL_MS` | `3000` | Terminal save request lifetime |
    /// | `SYNAPSE_SEARCH_CACHE_TTL_SECS` | `300` | Search memo TTL |
    /// | `SYNAPSE_SEARCH_CACHE_CAPACITY` | `128` | Search memo size |
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let api_base_url = std::env::var("SYNAPSE_API_BASE_URL")
            .unwrap_or_else(|_| defaults::API_BASE_URL.to_string());
        let kg_api_base_url = std::env::var("SYNAPSE_KG_API_BASE_URL")
            .unwrap_or_else(|_| defaults::KG_API_BASE_URL.to_string());
        let store_path = std::env::var("SYNAPSE_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(defaults::STORE_PATH));

        Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            kg_api_base_url: kg_api_base_url.trim_end_matches('/').to_string(),
            store_path,
            http_timeout_secs: env_parse("SYNAPSE_HTTP_TIMEOUT_SECS", defaults::HTTP_TIMEOUT_SECS),
            debounce_ms: env_parse("SYNAPSE_DEBOUNCE_MS", defaults::DEBOUNCE_MS),
            batch_change_threshold: env_parse(
                "SYNAPSE_BATCH_CHANGE_THRESHOLD",
                defaults::BATCH_CHANGE_THRESHOLD,
            )
            .max(1),
            batch_interval_secs: env_parse(
                "SYNAPSE_BATCH_INTERVAL_SECS",
                defaults::BATCH_INTERVAL_SECS,
            ),
            save_status_removal_ms: env_parse(
                "SYNAPSE_SAVE_STATUS_REMOVAL_MS",
                defaults::SAVE_STATUS_REMOVAL_MS,
            ),
            search_cache_ttl_secs: env_parse(
                "SYNAPSE_SEARCH_CACHE_TTL_SECS",
                defaults::SEARCH_CACHE_TTL_SECS,
            ),
            search_cache_capacity: env_parse(
                "SYNAPSE_SEARCH_CACHE_CAPACITY",
                defaults::SEARCH_CACHE_CAPACITY,
            )
            .max(1),
        }
    }

    /// Set the REST backend base URL.
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Set the summarization service base URL.
    pub fn with_kg_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.kg_api_base_url = url.into();
        self
    }

    /// Set the storage medium file.
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    /// Set the autosave debounce delay.
    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Set the change-count promotion threshold.
    pub fn with_batch_change_threshold(mut self, threshold: u32) -> Self {
        self.batch_change_threshold = threshold.max(1);
        self
    }

    /// Set the elapsed-time promotion threshold.
    pub fn with_batch_interval_secs(mut self, secs: u64) -> Self {
        self.batch_interval_secs = secs;
        self
    }

    /// Set the terminal save request removal delay.
    pub fn with_save_status_removal_ms(mut self, ms: u64) -> Self {
        self.save_status_removal_ms = ms;
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn batch_interval(&self) -> Duration {
        Duration::from_secs(self.batch_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn save_status_removal(&self) -> Duration {
        Duration::from_millis(self.save_status_removal_ms)
    }

    pub fn search_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.search_cache_ttl_secs)
    }
}
