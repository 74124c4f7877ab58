//! Mock backends for deterministic testing.
//!
//! In-memory stand-ins for the draft cache, the durable note store, the
//! unload beacon, and the page saver. Every mock records its calls and can
//! be switched into failure modes while a test is running.
//!
//! ## Usage
//!
//! ```ignore
//! use synapse_client::mock::{MockDraftCache, MockNoteRepository};
//!
//! let cache = MockDraftCache::new();
//! let notes = MockNoteRepository::new().with_cache(cache.clone());
//! cache.set_fail_saves(true);
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use synapse_core::{
    BeaconSender, Draft, DraftCache, DraftList, DraftRequest, Error, Note, NoteContent,
    NoteRepository, PageSaver, Result, SavePageResponse,
};

// =============================================================================
// DRAFT CACHE
// =============================================================================

/// In-memory draft cache with optimistic version checks.
///
/// A save naming a version must match the stored one or it is rejected
/// with [`Error::Conflict`]; accepted saves bump the version by one.
#[derive(Clone, Default)]
pub struct MockDraftCache {
    drafts: Arc<Mutex<HashMap<Uuid, Draft>>>,
    save_log: Arc<Mutex<Vec<DraftRequest>>>,
    delete_log: Arc<Mutex<Vec<Uuid>>>,
    fail_saves: Arc<AtomicBool>,
    fail_gets: Arc<AtomicBool>,
    fail_deletes: Arc<AtomicBool>,
}

impl MockDraftCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the cache with an existing draft.
    pub fn with_draft(self, draft: Draft) -> Self {
        self.drafts.lock().unwrap().insert(draft.id, draft);
        self
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Current stored copy of a draft.
    pub fn stored(&self, id: Uuid) -> Option<Draft> {
        self.drafts.lock().unwrap().get(&id).cloned()
    }

    /// Simulate a write from another client.
    pub fn bump_version(&self, id: Uuid, title: &str, content: &str) {
        if let Some(draft) = self.drafts.lock().unwrap().get_mut(&id) {
            draft.version += 1;
            draft.title = title.to_string();
            draft.content = content.to_string();
            draft.last_modified = Utc::now();
        }
    }

    pub fn save_calls(&self) -> Vec<DraftRequest> {
        self.save_log.lock().unwrap().clone()
    }

    pub fn save_call_count(&self) -> usize {
        self.save_log.lock().unwrap().len()
    }

    pub fn delete_calls(&self) -> Vec<Uuid> {
        self.delete_log.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.save_log.lock().unwrap().clear();
        self.delete_log.lock().unwrap().clear();
    }
}

#[async_trait]
impl DraftCache for MockDraftCache {
    async fn save(&self, request: &DraftRequest) -> Result<Draft> {
        self.save_log.lock().unwrap().push(request.clone());
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Error::Request("mock draft cache unavailable".into()));
        }

        let id = request.id.unwrap_or_else(Uuid::new_v4);
        let mut drafts = self.drafts.lock().unwrap();
        let draft = match drafts.get(&id) {
            Some(existing) => {
                if let Some(version) = request.version {
                    if version != existing.version {
                        return Err(Error::Conflict(format!(
                            "draft {} is at version {}, got {}",
                            id, existing.version, version
                        )));
                    }
                }
                Draft {
                    id,
                    title: request.title.clone().unwrap_or_else(|| existing.title.clone()),
                    content: request
                        .content
                        .clone()
                        .unwrap_or_else(|| existing.content.clone()),
                    version: existing.version + 1,
                    last_modified: Utc::now(),
                }
            }
            None => Draft {
                id,
                title: request.title.clone().unwrap_or_default(),
                content: request.content.clone().unwrap_or_default(),
                version: 1,
                last_modified: Utc::now(),
            },
        };
        drafts.insert(id, draft.clone());
        Ok(draft)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Draft>> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(Error::Request("mock draft cache unavailable".into()));
        }
        Ok(self.stored(id))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.delete_log.lock().unwrap().push(id);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Error::Request("mock draft cache unavailable".into()));
        }
        self.drafts.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn list(&self) -> Result<DraftList> {
        let mut drafts: Vec<Draft> = self.drafts.lock().unwrap().values().cloned().collect();
        drafts.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(DraftList {
            total_count: drafts.len(),
            drafts,
        })
    }
}

// =============================================================================
// NOTE REPOSITORY
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromotionMode {
    Succeed,
    Fail,
    Conflict,
}

/// In-memory durable note store.
#[derive(Clone)]
pub struct MockNoteRepository {
    notes: Arc<Mutex<HashMap<i64, Note>>>,
    next_id: Arc<Mutex<i64>>,
    promote_log: Arc<Mutex<Vec<Uuid>>>,
    mode: Arc<Mutex<PromotionMode>>,
    latency: Option<Duration>,
    cache: Option<MockDraftCache>,
}

impl Default for MockNoteRepository {
    fn default() -> Self {
        Self {
            notes: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(1)),
            promote_log: Arc::new(Mutex::new(Vec::new())),
            mode: Arc::new(Mutex::new(PromotionMode::Succeed)),
            latency: None,
            cache: None,
        }
    }
}

impl MockNoteRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Promote from this cache's stored copy, like the real backend.
    pub fn with_cache(mut self, cache: MockDraftCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Delay every promotion by `latency`.
    pub fn with_promotion_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn set_fail_promotions(&self, fail: bool) {
        *self.mode.lock().unwrap() = if fail {
            PromotionMode::Fail
        } else {
            PromotionMode::Succeed
        };
    }

    /// Answer promotions with 409, as when the unload beacon got there first.
    pub fn set_conflict_promotions(&self, conflict: bool) {
        *self.mode.lock().unwrap() = if conflict {
            PromotionMode::Conflict
        } else {
            PromotionMode::Succeed
        };
    }

    pub fn promote_calls(&self) -> Vec<Uuid> {
        self.promote_log.lock().unwrap().clone()
    }

    pub fn promote_call_count(&self) -> usize {
        self.promote_log.lock().unwrap().len()
    }

    pub fn note(&self, id: i64) -> Option<Note> {
        self.notes.lock().unwrap().get(&id).cloned()
    }

    pub fn note_count(&self) -> usize {
        self.notes.lock().unwrap().len()
    }

    fn insert(&self, title: String, content: String) -> i64 {
        let id = {
            let mut next = self.next_id.lock().unwrap();
            let id = *next;
            *next += 1;
            id
        };
        let now = Utc::now();
        self.notes.lock().unwrap().insert(
            id,
            Note {
                id,
                title,
                content,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }
}

#[async_trait]
impl NoteRepository for MockNoteRepository {
    async fn create(&self, note: &NoteContent) -> Result<i64> {
        Ok(self.insert(note.title.clone(), note.content.clone()))
    }

    async fn get(&self, id: i64) -> Result<Note> {
        self.note(id)
            .ok_or_else(|| Error::NotFound(format!("note {}", id)))
    }

    async fn update(&self, id: i64, note: &NoteContent) -> Result<()> {
        let mut notes = self.notes.lock().unwrap();
        let existing = notes
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("note {}", id)))?;
        existing.title = note.title.clone();
        existing.content = note.content.clone();
        existing.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.notes
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("note {}", id)))
    }

    async fn create_from_draft(&self, draft_id: Uuid) -> Result<i64> {
        self.promote_log.lock().unwrap().push(draft_id);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mode = *self.mode.lock().unwrap();
        match mode {
            PromotionMode::Fail => {
                return Err(Error::Request("mock note store unavailable".into()))
            }
            PromotionMode::Conflict => {
                return Err(Error::Conflict(format!(
                    "draft {} is already being promoted",
                    draft_id
                )))
            }
            PromotionMode::Succeed => {}
        }

        let (title, content) = match &self.cache {
            Some(cache) => {
                let draft = cache
                    .stored(draft_id)
                    .ok_or_else(|| Error::NotFound(format!("draft {}", draft_id)))?;
                (draft.title, draft.content)
            }
            None => (String::new(), String::new()),
        };
        Ok(self.insert(title, content))
    }
}

// =============================================================================
// BEACON
// =============================================================================

/// A beacon payload captured by [`MockBeacon`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconCall {
    pub draft_id: Uuid,
    pub title: String,
    pub content: String,
}

/// Records beacons instead of sending them.
#[derive(Clone)]
pub struct MockBeacon {
    calls: Arc<Mutex<Vec<BeaconCall>>>,
    accept: Arc<AtomicBool>,
}

impl Default for MockBeacon {
    fn default() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            accept: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl MockBeacon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `send` report that the payload could not be queued.
    pub fn set_accept(&self, accept: bool) {
        self.accept.store(accept, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<BeaconCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl BeaconSender for MockBeacon {
    fn send(&self, draft_id: Uuid, title: &str, content: &str) -> bool {
        self.calls.lock().unwrap().push(BeaconCall {
            draft_id,
            title: title.to_string(),
            content: content.to_string(),
        });
        self.accept.load(Ordering::SeqCst)
    }
}

// =============================================================================
// PAGE SAVER
// =============================================================================

/// Records submitted URL batches.
#[derive(Clone, Default)]
pub struct MockPageSaver {
    calls: Arc<Mutex<Vec<Vec<String>>>>,
    fail: Arc<AtomicBool>,
}

impl MockPageSaver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageSaver for MockPageSaver {
    async fn save_pages(&self, urls: &[String]) -> Result<SavePageResponse> {
        self.calls.lock().unwrap().push(urls.to_vec());
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Request("mock summarizer unavailable".into()));
        }
        Ok(SavePageResponse {
            success: true,
            message: format!("{} pages queued", urls.len()),
            note_id: Some(1),
        })
    }
}
