//! Saving the collected pages as one batch.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument, warn};

use synapse_core::{new_batch_id, now_millis, Error, PageSaver, RelayMessage, Result};

use crate::collections::{PageCollection, SaveRequestCollection};
use crate::relay::BroadcastRelay;

/// Outcome of one page save batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub batch_id: String,
    pub urls: Vec<String>,
    pub success: bool,
    pub note_id: Option<i64>,
    pub error: Option<String>,
}

/// Drives a page save: tracks per-URL requests, announces progress to every
/// tab, and clears the collected pages once the batch succeeds.
pub struct SaveBatchCoordinator {
    pages: Arc<PageCollection>,
    requests: Arc<SaveRequestCollection>,
    relay: Arc<BroadcastRelay>,
    saver: Arc<dyn PageSaver>,
}

impl SaveBatchCoordinator {
    pub fn new(
        pages: Arc<PageCollection>,
        requests: Arc<SaveRequestCollection>,
        relay: Arc<BroadcastRelay>,
        saver: Arc<dyn PageSaver>,
    ) -> Self {
        Self {
            pages,
            requests,
            relay,
            saver,
        }
    }

    /// Save every collected page. An empty collection is rejected before any
    /// network call; a failed save is reported, not returned as an error.
    #[instrument(skip(self), fields(subsystem = "store", component = "batch"))]
    pub async fn save_collected(&self) -> Result<BatchReport> {
        let urls = self.pages.items();
        if urls.is_empty() {
            return Err(Error::InvalidInput("no pages collected".to_string()));
        }

        let batch_id = new_batch_id();
        let batch_timestamp = now_millis();
        let start = Instant::now();

        self.requests
            .begin_from_broadcast(&urls, &batch_id, batch_timestamp)
            .await;
        self.relay.broadcast(RelayMessage::BatchStarted {
            batch_id: batch_id.clone(),
            batch_timestamp,
            urls: urls.clone(),
        });

        let (success, note_id, error) = match self.saver.save_pages(&urls).await {
            Ok(resp) if resp.success => (true, resp.note_id, None),
            Ok(resp) => (false, None, Some(resp.message)),
            Err(e) => (false, None, Some(e.to_string())),
        };

        self.requests
            .complete_by_urls(&urls, &batch_id, success, error.clone())
            .await;
        self.relay.broadcast(RelayMessage::BatchCompleted {
            batch_id: batch_id.clone(),
            urls: urls.clone(),
            success,
            error: error.clone(),
        });

        let duration_ms = start.elapsed().as_millis() as u64;
        if success {
            self.pages.clear().await;
            info!(
                batch_id = %batch_id,
                url_count = urls.len(),
                duration_ms,
                "Page batch saved"
            );
        } else {
            warn!(
                batch_id = %batch_id,
                error = error.as_deref().unwrap_or("unknown"),
                duration_ms,
                "Page batch failed"
            );
        }

        Ok(BatchReport {
            batch_id,
            urls,
            success,
            note_id,
            error,
        })
    }
}
