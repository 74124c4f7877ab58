//! The concrete collections shared between contexts.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use synapse_core::defaults::{
    KEY_COLLECTED_PAGES, KEY_OVERLAY_STATE, KEY_PENDING_SNIPPETS, KEY_SAVE_REQUESTS,
};
use synapse_core::{
    now_millis, KeyedStore, OverlayState, PendingTextSnippet, RelayMessage, SaveRequest,
    SaveRequestStatus, SyncConfig,
};

use crate::change_bus::{ChangeBus, CollectionChange};
use crate::collection::{
    CollectionSpec, CollectionState, MutationOutcome, OptimisticCollection, OptimisticValue,
};

// =============================================================================
// PAGES
// =============================================================================

/// Collected page URLs; identity is exact string equality.
pub struct PageSpec;

impl CollectionSpec for PageSpec {
    type Item = String;
    const KEY: &'static str = KEY_COLLECTED_PAGES;

    fn id(item: &String) -> &str {
        item
    }

    fn is_duplicate(existing: &String, candidate: &String) -> bool {
        existing == candidate
    }

    fn validate(item: &String) -> Result<(), String> {
        if item.trim().is_empty() {
            Err("page URL is empty".to_string())
        } else {
            Ok(())
        }
    }
}

pub type PageCollection = OptimisticCollection<PageSpec>;

// =============================================================================
// SNIPPETS
// =============================================================================

/// Pending text snippets; a snippet duplicates another when both the text
/// and the source URL match. Removal is by snippet id.
pub struct SnippetSpec;

impl CollectionSpec for SnippetSpec {
    type Item = PendingTextSnippet;
    const KEY: &'static str = KEY_PENDING_SNIPPETS;

    fn id(item: &PendingTextSnippet) -> &str {
        &item.id
    }

    fn is_duplicate(existing: &PendingTextSnippet, candidate: &PendingTextSnippet) -> bool {
        existing.text == candidate.text && existing.source_url == candidate.source_url
    }

    fn validate(item: &PendingTextSnippet) -> Result<(), String> {
        if item.text.trim().is_empty() {
            Err("snippet text is empty".to_string())
        } else {
            Ok(())
        }
    }
}

pub type SnippetCollection = OptimisticCollection<SnippetSpec>;

// =============================================================================
// SAVE REQUESTS
// =============================================================================

/// Save requests keyed by id.
pub struct SaveRequestSpec;

impl CollectionSpec for SaveRequestSpec {
    type Item = SaveRequest;
    const KEY: &'static str = KEY_SAVE_REQUESTS;

    fn id(item: &SaveRequest) -> &str {
        &item.id
    }

    fn is_duplicate(existing: &SaveRequest, candidate: &SaveRequest) -> bool {
        existing.id == candidate.id
    }

    fn validate(item: &SaveRequest) -> Result<(), String> {
        if item.url.trim().is_empty() {
            Err("save request URL is empty".to_string())
        } else {
            Ok(())
        }
    }
}

/// Save-request collection with status transitions and timed removal of
/// finished requests.
pub struct SaveRequestCollection {
    inner: Arc<OptimisticCollection<SaveRequestSpec>>,
    removal_delay: Duration,
}

impl Deref for SaveRequestCollection {
    type Target = OptimisticCollection<SaveRequestSpec>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Id for a locally started request: `save-<ms>-<7 random chars>`.
fn local_request_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("save-{}-{}", now_millis(), suffix)
}

/// Deterministic id for a request announced by a batch broadcast, so every
/// tab derives the same id for the same (batch, URL).
pub fn broadcast_request_id(batch_timestamp: i64, url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    format!("save-{}-{}", batch_timestamp, &hex::encode(digest)[..12])
}

impl SaveRequestCollection {
    pub fn new(store: Arc<dyn KeyedStore>, removal_delay: Duration) -> Self {
        Self {
            inner: Arc::new(OptimisticCollection::new(store)),
            removal_delay,
        }
    }

    /// Start tracking a save of `url`. Returns the new request id, or `None`
    /// when the request could not be recorded.
    pub async fn begin(&self, url: &str, batch_id: &str, batch_timestamp: i64) -> Option<String> {
        let request = SaveRequest {
            id: local_request_id(),
            url: url.to_string(),
            status: SaveRequestStatus::Saving,
            start_time: now_millis(),
            completed_time: None,
            error: None,
            batch_id: batch_id.to_string(),
            batch_timestamp,
        };
        let id = request.id.clone();
        self.inner.add(request).await.is_applied().then_some(id)
    }

    /// Record requests announced by another tab. Ids already present are
    /// skipped; returns how many were added.
    pub async fn begin_from_broadcast(
        &self,
        urls: &[String],
        batch_id: &str,
        batch_timestamp: i64,
    ) -> usize {
        let start_time = now_millis();
        let mut added = 0;
        let outcome = self
            .inner
            .modify("begin_from_broadcast", |items| {
                let mut next = items.clone();
                for url in urls.iter().filter(|u| !u.trim().is_empty()) {
                    let id = broadcast_request_id(batch_timestamp, url);
                    if next.iter().any(|r| r.id == id) {
                        continue;
                    }
                    next.push(SaveRequest {
                        id,
                        url: url.clone(),
                        status: SaveRequestStatus::Saving,
                        start_time,
                        completed_time: None,
                        error: None,
                        batch_id: batch_id.to_string(),
                        batch_timestamp,
                    });
                    added += 1;
                }
                if added == 0 {
                    Err(MutationOutcome::Duplicate)
                } else {
                    Ok(next)
                }
            })
            .await;
        if outcome.is_applied() {
            added
        } else {
            0
        }
    }

    /// Move a request forward. Terminal requests never change; a terminal
    /// status sets `completed_time` and schedules removal.
    pub async fn update_status(
        &self,
        id: &str,
        status: SaveRequestStatus,
        error: Option<String>,
    ) -> MutationOutcome {
        let outcome = self
            .inner
            .modify("update_status", |items| {
                let mut next = items.clone();
                let request = next
                    .iter_mut()
                    .find(|r| r.id == id)
                    .ok_or(MutationOutcome::NotFound)?;
                if !request.status.can_advance_to(status) {
                    return Err(MutationOutcome::Invalid(format!(
                        "cannot move save request from {:?} to {:?}",
                        request.status, status
                    )));
                }
                request.status = status;
                request.error = error;
                if status.is_terminal() {
                    request.completed_time = Some(now_millis());
                }
                Ok(next)
            })
            .await;
        if outcome.is_applied() && status.is_terminal() {
            self.schedule_removal(vec![id.to_string()]);
        }
        outcome
    }

    /// Finish every non-terminal request of `batch_id` whose URL is in `urls`.
    pub async fn complete_by_urls(
        &self,
        urls: &[String],
        batch_id: &str,
        success: bool,
        error: Option<String>,
    ) -> usize {
        let status = if success {
            SaveRequestStatus::Success
        } else {
            SaveRequestStatus::Error
        };
        let completed_time = now_millis();
        let mut finished = Vec::new();
        let outcome = self
            .inner
            .modify("complete_by_urls", |items| {
                let mut next = items.clone();
                for request in next.iter_mut().filter(|r| {
                    r.batch_id == batch_id && urls.contains(&r.url) && !r.status.is_terminal()
                }) {
                    request.status = status;
                    request.completed_time = Some(completed_time);
                    request.error = if success { None } else { error.clone() };
                    finished.push(request.id.clone());
                }
                if finished.is_empty() {
                    Err(MutationOutcome::NotFound)
                } else {
                    Ok(next)
                }
            })
            .await;
        if !outcome.is_applied() {
            return 0;
        }
        let count = finished.len();
        self.schedule_removal(finished);
        count
    }

    /// Drop every terminal request.
    pub async fn clear_completed(&self) -> MutationOutcome {
        self.inner
            .modify("clear_completed", |items| {
                Ok(items
                    .iter()
                    .filter(|r| !r.status.is_terminal())
                    .cloned()
                    .collect())
            })
            .await
    }

    /// Number of requests still in flight.
    pub fn saving_count(&self) -> usize {
        self.inner
            .items()
            .iter()
            .filter(|r| r.status == SaveRequestStatus::Saving)
            .count()
    }

    /// Requests ordered newest first.
    pub fn request_list(&self) -> Vec<SaveRequest> {
        let mut list = self.inner.items();
        list.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        list
    }

    /// Mirror a batch event received from another tab.
    pub async fn apply_relay(&self, message: &RelayMessage) {
        match message {
            RelayMessage::BatchStarted {
                batch_id,
                batch_timestamp,
                urls,
            } => {
                self.begin_from_broadcast(urls, batch_id, *batch_timestamp)
                    .await;
            }
            RelayMessage::BatchCompleted {
                batch_id,
                urls,
                success,
                error,
            } => {
                self.complete_by_urls(urls, batch_id, *success, error.clone())
                    .await;
            }
            RelayMessage::AuthChanged { .. } => {}
        }
    }

    fn schedule_removal(&self, ids: Vec<String>) {
        if ids.is_empty() {
            return;
        }
        let inner = Arc::clone(&self.inner);
        let delay = self.removal_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            for id in ids {
                if inner.contains(&id) {
                    inner.remove(&id).await;
                    debug!(request_id = %id, "Finished save request removed");
                }
            }
        });
    }
}

// =============================================================================
// OVERLAY STATE
// =============================================================================

/// Overlay visibility shared by every tab; defaults to expanded.
pub struct OverlayStateCell {
    inner: OptimisticValue<OverlayState>,
}

impl OverlayStateCell {
    pub fn new(store: Arc<dyn KeyedStore>) -> Self {
        Self {
            inner: OptimisticValue::new(store, KEY_OVERLAY_STATE),
        }
    }

    pub async fn load(&self) {
        self.inner.load().await
    }

    pub fn get(&self) -> OverlayState {
        self.inner.get()
    }

    pub fn error(&self) -> Option<String> {
        self.inner.error()
    }

    pub fn subscribe(&self) -> watch::Receiver<CollectionState<OverlayState>> {
        self.inner.subscribe()
    }

    pub async fn set(&self, state: OverlayState) -> MutationOutcome {
        self.inner.mutate("set_overlay", move |_| Ok(state)).await
    }

    pub async fn expand(&self) -> MutationOutcome {
        self.set(OverlayState::Expanded).await
    }

    pub async fn collapse(&self) -> MutationOutcome {
        self.set(OverlayState::Collapsed).await
    }

    pub async fn hide(&self) -> MutationOutcome {
        self.set(OverlayState::Hidden).await
    }

    pub async fn toggle(&self) -> MutationOutcome {
        self.inner
            .mutate("toggle_overlay", |current| Ok(current.toggled()))
            .await
    }

    pub fn sync_from_store(&self, state: OverlayState) {
        self.inner.sync_from_store(state)
    }
}

// =============================================================================
// COLLECTION SET
// =============================================================================

/// All collections of one execution context.
#[derive(Clone)]
pub struct CollectionSet {
    pub pages: Arc<PageCollection>,
    pub snippets: Arc<SnippetCollection>,
    pub save_requests: Arc<SaveRequestCollection>,
    pub overlay: Arc<OverlayStateCell>,
}

impl CollectionSet {
    pub fn new(store: Arc<dyn KeyedStore>, config: &SyncConfig) -> Self {
        Self {
            pages: Arc::new(PageCollection::new(Arc::clone(&store))),
            snippets: Arc::new(SnippetCollection::new(Arc::clone(&store))),
            save_requests: Arc::new(SaveRequestCollection::new(
                Arc::clone(&store),
                config.save_status_removal(),
            )),
            overlay: Arc::new(OverlayStateCell::new(store)),
        }
    }

    /// Load every collection from the store.
    pub async fn load_all(&self) {
        tokio::join!(
            self.pages.load(),
            self.snippets.load(),
            self.save_requests.load(),
            self.overlay.load(),
        );
    }

    /// Route typed changes from `bus` into the matching collection.
    pub fn spawn_sync(&self, bus: &ChangeBus) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        let set = self.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(change) => set.apply(change).await,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Collection sync lagged, reloading");
                        set.load_all().await;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            info!("Collection sync stopped");
        })
    }

    pub async fn apply(&self, change: CollectionChange) {
        match change {
            CollectionChange::Pages(pages) => self.pages.sync_from_store(pages),
            CollectionChange::Snippets(snippets) => self.snippets.sync_from_store(snippets),
            CollectionChange::SaveRequests(requests) => {
                self.save_requests.sync_from_store(requests)
            }
            CollectionChange::Overlay(state) => self.overlay.sync_from_store(state),
            CollectionChange::Resync => self.load_all().await,
        }
    }
}
