//! Draft autosave engine.
//!
//! One engine runs per open draft. Edits update the observable snapshot
//! immediately and restart the debounce timer; when the timer fires the
//! latest title/content go to the remote ephemeral cache. After each
//! accepted persist the batch policy may promote the draft to a durable
//! note. Teardown fires a best-effort beacon; closing the editor awaits
//! promotion.
//!
//! The engine is a handle ([`DraftAutosaveEngine`]) in front of an actor
//! task that owns the timer, counters, and all remote calls, so remote
//! calls for one draft never overlap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use synapse_core::defaults::{DRAFT_EVENT_CAPACITY, INITIAL_DRAFT_VERSION};
use synapse_core::logging::{CHANGE_COUNT, VERSION};
use synapse_core::{
    new_draft_id, BeaconSender, DegradedDraftStore, Draft, DraftCache, DraftRequest, Error,
    NoteRepository, Result, SyncConfig,
};

use crate::debounce::Debouncer;
use crate::policy::{is_cacheable, is_promotable, BatchPolicy};
use crate::snapshot::{
    CloseOutcome, DraftEvent, DraftPayload, DraftPhase, DraftSnapshot, PromotionOutcome,
};

/// Invoked with the new note id after every successful promotion.
pub type PromotionCallback = Arc<dyn Fn(i64) + Send + Sync>;

/// Timing configuration for one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftConfig {
    pub debounce: Duration,
    pub policy: BatchPolicy,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

impl DraftConfig {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            debounce: config.debounce(),
            policy: BatchPolicy::from_config(config),
        }
    }
}

/// External collaborators used by the engine.
#[derive(Clone)]
pub struct DraftBackends {
    pub cache: Arc<dyn DraftCache>,
    pub notes: Arc<dyn NoteRepository>,
    pub degraded: Arc<dyn DegradedDraftStore>,
    pub beacon: Arc<dyn BeaconSender>,
}

/// Builder for [`DraftAutosaveEngine`].
pub struct DraftEngineBuilder {
    backends: DraftBackends,
    config: DraftConfig,
    on_promoted: Option<PromotionCallback>,
}

impl DraftEngineBuilder {
    pub fn config(mut self, config: DraftConfig) -> Self {
        self.config = config;
        self
    }

    pub fn on_promoted(mut self, callback: impl Fn(i64) + Send + Sync + 'static) -> Self {
        self.on_promoted = Some(Arc::new(callback));
        self
    }

    /// Start an engine for a brand-new draft with a fresh id.
    pub fn new_draft(self) -> DraftAutosaveEngine {
        let draft = Draft::empty(new_draft_id());
        DraftAutosaveEngine::start(self, draft, DraftPhase::Clean, false, None, false, false)
    }

    /// Load `id` from the cache and start an engine for it.
    ///
    /// A missing draft starts empty. A degraded local copy newer than the
    /// cached one (or present when the cache has none) is restored and
    /// scheduled for re-upload; an older one is dropped. Cache read failures
    /// fall back the same way, and the first persist then carries the
    /// initial version so an existing remote entry reports a conflict.
    #[instrument(skip(self), fields(subsystem = "draft", draft_id = %id))]
    pub async fn open(self, id: Uuid) -> Result<DraftAutosaveEngine> {
        let (cached, remote_unknown) = match self.backends.cache.get(id).await {
            Ok(draft) => (draft, false),
            Err(e) => {
                warn!(draft_id = %id, error = %e, "Draft cache read failed, using local state");
                (None, true)
            }
        };
        let degraded = match self.backends.degraded.load(id).await {
            Ok(draft) => draft,
            Err(e) => {
                warn!(draft_id = %id, error = %e, "Degraded draft read failed");
                None
            }
        };

        let engine = match (cached, degraded) {
            (Some(cached), Some(local)) if local.last_modified > cached.last_modified => {
                let restored = Draft {
                    version: cached.version,
                    ..local
                };
                let payload = payload_of(&restored);
                Self::restored(self, restored, true, false, payload)
            }
            (Some(cached), stale) => {
                let stale_copy_left = match stale {
                    Some(_) => match self.backends.degraded.remove(id).await {
                        Ok(()) => {
                            debug!(draft_id = %id, "Dropped degraded copy older than cache");
                            false
                        }
                        Err(e) => {
                            warn!(draft_id = %id, error = %e, "Stale degraded draft not removed");
                            true
                        }
                    },
                    None => false,
                };
                let payload = payload_of(&cached);
                DraftAutosaveEngine::start(
                    self,
                    cached,
                    DraftPhase::Clean,
                    true,
                    Some(payload),
                    stale_copy_left,
                    false,
                )
            }
            (None, Some(local)) => {
                let restored = Draft {
                    version: INITIAL_DRAFT_VERSION,
                    ..local
                };
                let payload = payload_of(&restored);
                Self::restored(self, restored, false, remote_unknown, payload)
            }
            (None, None) => DraftAutosaveEngine::start(
                self,
                Draft::empty(id),
                DraftPhase::Clean,
                false,
                None,
                false,
                remote_unknown,
            ),
        };
        Ok(engine)
    }

    fn restored(
        builder: Self,
        draft: Draft,
        persisted: bool,
        remote_unknown: bool,
        payload: DraftPayload,
    ) -> DraftAutosaveEngine {
        info!(draft_id = %draft.id, "Restoring degraded draft copy");
        let engine = DraftAutosaveEngine::start(
            builder,
            draft,
            DraftPhase::Dirty,
            persisted,
            None,
            true,
            remote_unknown,
        );
        let _ = engine.commands.send(Command::Edit(payload));
        engine
    }
}

fn payload_of(draft: &Draft) -> DraftPayload {
    DraftPayload {
        title: draft.title.clone(),
        content: draft.content.clone(),
    }
}

enum Command {
    Edit(DraftPayload),
    Flush(oneshot::Sender<Result<()>>),
    Promote(oneshot::Sender<Result<PromotionOutcome>>),
    Reload(oneshot::Sender<Result<()>>),
    Delete(oneshot::Sender<Result<()>>),
    Close(oneshot::Sender<Result<CloseOutcome>>),
}

/// Handle to the autosave engine of one open draft.
pub struct DraftAutosaveEngine {
    id: Uuid,
    commands: mpsc::UnboundedSender<Command>,
    snapshot: Arc<watch::Sender<DraftSnapshot>>,
    events: broadcast::Sender<DraftEvent>,
    promoting: Arc<AtomicBool>,
    beacon: Arc<dyn BeaconSender>,
    task: JoinHandle<()>,
}

impl DraftAutosaveEngine {
    pub fn builder(backends: DraftBackends) -> DraftEngineBuilder {
        DraftEngineBuilder {
            backends,
            config: DraftConfig::default(),
            on_promoted: None,
        }
    }

    fn start(
        builder: DraftEngineBuilder,
        draft: Draft,
        phase: DraftPhase,
        persisted: bool,
        last_persisted: Option<DraftPayload>,
        has_degraded_copy: bool,
        remote_unknown: bool,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(DraftSnapshot::from_draft(&draft, phase));
        let snapshot = Arc::new(snapshot_tx);
        let (events, _) = broadcast::channel(DRAFT_EVENT_CAPACITY);
        let promoting = Arc::new(AtomicBool::new(false));
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let beacon = Arc::clone(&builder.backends.beacon);

        let actor = DraftActor {
            id: draft.id,
            backends: builder.backends,
            policy: builder.config.policy,
            on_promoted: builder.on_promoted,
            snapshot: Arc::clone(&snapshot),
            events: events.clone(),
            promoting: Arc::clone(&promoting),
            debouncer: Debouncer::new(builder.config.debounce),
            persisted,
            last_persisted,
            has_degraded_copy,
            remote_unknown,
            last_durable_save: Instant::now(),
        };
        let task = tokio::spawn(actor.run(commands_rx));
        debug!(draft_id = %draft.id, persisted, "Draft engine started");

        Self {
            id: draft.id,
            commands,
            snapshot,
            events,
            promoting,
            beacon,
            task,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn snapshot(&self) -> DraftSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Watch the draft's title/content/loading/saving state.
    pub fn subscribe(&self) -> watch::Receiver<DraftSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<DraftEvent> {
        self.events.subscribe()
    }

    pub fn handle_title_change(&self, title: impl Into<String>) {
        let title = title.into();
        self.edit(|s| s.title = title);
    }

    pub fn handle_content_change(&self, content: impl Into<String>) {
        let content = content.into();
        self.edit(|s| s.content = content);
    }

    fn edit(&self, apply: impl FnOnce(&mut DraftSnapshot)) {
        let mut payload = None;
        self.snapshot.send_modify(|s| {
            apply(s);
            s.mark_dirty();
            s.last_modified = Utc::now();
            payload = Some(s.payload());
        });
        if let Some(payload) = payload {
            let _ = self.commands.send(Command::Edit(payload));
        }
    }

    /// Send any pending edit to the cache now.
    pub async fn flush(&self) -> Result<()> {
        self.request(Command::Flush).await?
    }

    /// Promote the draft to a durable note now.
    pub async fn save_to_database(&self) -> Result<PromotionOutcome> {
        if self
            .promoting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(draft_id = %self.id, "Promotion already in flight");
            return Ok(PromotionOutcome::AlreadyInFlight);
        }
        match self.request(Command::Promote).await {
            Ok(result) => result,
            Err(e) => {
                self.promoting.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Best-effort flush during teardown. Never blocks; returns whether a
    /// beacon was dispatched.
    pub fn on_unload(&self) -> bool {
        if self.promoting.load(Ordering::SeqCst) {
            debug!(draft_id = %self.id, "Unload during promotion, beacon skipped");
            return false;
        }
        let (title, content) = {
            let s = self.snapshot.borrow();
            (s.title.clone(), s.content.clone())
        };
        if !is_promotable(&title, &content) {
            return false;
        }
        let sent = self.beacon.send(self.id, &title, &content);
        debug!(draft_id = %self.id, sent, "Unload beacon");
        sent
    }

    /// Replace local state with the cache's copy, dropping any pending edit.
    pub async fn reload(&self) -> Result<()> {
        self.request(Command::Reload).await?
    }

    /// Delete the draft from the cache without promoting it.
    pub async fn delete_draft(&self) -> Result<()> {
        self.request(Command::Delete).await?
    }

    /// Close the editor: promote when both fields have content, discard when
    /// both are empty, otherwise leave the draft in the cache.
    pub async fn close(self) -> Result<CloseOutcome> {
        let outcome = self.request(Command::Close).await?;
        let _ = self.task.await;
        outcome
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .map_err(|_| Error::Internal("draft engine stopped".to_string()))?;
        rx.await
            .map_err(|_| Error::Internal("draft engine dropped request".to_string()))
    }
}

struct DraftActor {
    id: Uuid,
    backends: DraftBackends,
    policy: BatchPolicy,
    on_promoted: Option<PromotionCallback>,
    snapshot: Arc<watch::Sender<DraftSnapshot>>,
    events: broadcast::Sender<DraftEvent>,
    promoting: Arc<AtomicBool>,
    debouncer: Debouncer<DraftPayload>,
    /// Whether the cache holds an entry for this draft.
    persisted: bool,
    /// Payload last accepted by the cache.
    last_persisted: Option<DraftPayload>,
    has_degraded_copy: bool,
    /// The cache could not be read at open, so an entry may exist at an
    /// unknown version.
    remote_unknown: bool,
    last_durable_save: Instant,
}

impl DraftActor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            let deadline = self.debouncer.deadline();
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if self.handle(command).await {
                            break;
                        }
                    }
                    None => {
                        if let Some(payload) = self.debouncer.flush() {
                            let _ = self.persist_to_cache(payload).await;
                        }
                        break;
                    }
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Some(payload) = self.debouncer.take_due(Instant::now()) {
                        let _ = self.persist_to_cache(payload).await;
                    }
                }
            }
        }
        debug!(draft_id = %self.id, "Draft engine stopped");
    }

    /// Process one command; returns `true` when the engine should stop.
    async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Edit(payload) => {
                self.debouncer.schedule(payload, Instant::now());
                // Promotion may have reset the phase while this edit was queued.
                self.snapshot.send_modify(|s| s.mark_dirty());
            }
            Command::Flush(reply) => {
                let result = match self.debouncer.flush() {
                    Some(payload) => self.persist_to_cache(payload).await,
                    None => Ok(()),
                };
                let _ = reply.send(result);
            }
            Command::Promote(reply) => {
                let result = self.save_to_database().await;
                self.release_promotion();
                let _ = reply.send(result);
            }
            Command::Reload(reply) => {
                let _ = reply.send(self.reload().await);
            }
            Command::Delete(reply) => {
                let _ = reply.send(self.delete().await);
            }
            Command::Close(reply) => {
                let _ = reply.send(self.close().await);
                return true;
            }
        }
        false
    }

    fn emit(&self, event: DraftEvent) {
        let _ = self.events.send(event);
    }

    fn current_payload(&self) -> DraftPayload {
        self.snapshot.borrow().payload()
    }

    /// Send `payload` to the ephemeral cache. Failures write a degraded
    /// local copy and are not retried here.
    async fn persist_to_cache(&mut self, payload: DraftPayload) -> Result<()> {
        if !is_cacheable(&payload.title, &payload.content) {
            debug!(draft_id = %self.id, "Empty draft not sent to cache");
            self.snapshot.send_modify(|s| {
                if s.phase == DraftPhase::Dirty {
                    s.phase = DraftPhase::Clean;
                }
            });
            return Ok(());
        }

        let local_version = self.snapshot.borrow().version;
        let request = DraftRequest {
            id: Some(self.id),
            title: Some(payload.title.clone()),
            content: Some(payload.content.clone()),
            version: if self.persisted {
                Some(local_version)
            } else if self.remote_unknown {
                Some(INITIAL_DRAFT_VERSION)
            } else {
                None
            },
        };
        self.snapshot.send_modify(|s| {
            s.phase = DraftPhase::Persisting;
            s.is_saving = true;
        });

        match self.backends.cache.save(&request).await {
            Ok(stored) => {
                self.persisted = true;
                self.remote_unknown = false;
                self.last_persisted = Some(payload.clone());
                let mut change_count = 0;
                self.snapshot.send_modify(|s| {
                    s.version = stored.version;
                    s.change_count += 1;
                    s.is_saving = false;
                    s.last_error = None;
                    s.phase = if s.title == payload.title && s.content == payload.content {
                        DraftPhase::Clean
                    } else {
                        DraftPhase::Dirty
                    };
                    change_count = s.change_count;
                });
                debug!(
                    draft_id = %self.id,
                    { VERSION } = stored.version,
                    { CHANGE_COUNT } = change_count,
                    "Draft persisted to cache"
                );
                self.emit(DraftEvent::CachePersisted {
                    draft_id: self.id,
                    version: stored.version,
                });
                if self.has_degraded_copy && self.backends.degraded.remove(self.id).await.is_ok() {
                    self.has_degraded_copy = false;
                }
                self.maybe_promote().await;
                Ok(())
            }
            Err(e) => {
                if e.is_conflict() {
                    let remote_version = match self.backends.cache.get(self.id).await {
                        Ok(remote) => remote.map(|d| d.version),
                        Err(_) => None,
                    };
                    if let Some(version) = remote_version {
                        self.persisted = true;
                        self.remote_unknown = false;
                        self.snapshot.send_modify(|s| s.version = version);
                    }
                    warn!(
                        draft_id = %self.id,
                        local_version,
                        remote_version = ?remote_version,
                        "Draft version conflict"
                    );
                    self.emit(DraftEvent::Conflict {
                        draft_id: self.id,
                        local_version,
                        remote_version,
                    });
                } else {
                    warn!(draft_id = %self.id, error = %e, "Draft cache persist failed");
                    self.emit(DraftEvent::CacheFallback {
                        draft_id: self.id,
                        error: e.to_string(),
                    });
                }
                self.save_degraded(&payload, local_version).await;
                let message = e.to_string();
                self.snapshot.send_modify(|s| {
                    s.phase = DraftPhase::Dirty;
                    s.is_saving = false;
                    s.last_error = Some(message);
                });
                Err(e)
            }
        }
    }

    async fn save_degraded(&mut self, payload: &DraftPayload, version: u32) {
        let copy = Draft {
            id: self.id,
            title: payload.title.clone(),
            content: payload.content.clone(),
            version,
            last_modified: Utc::now(),
        };
        match self.backends.degraded.save(&copy).await {
            Ok(()) => self.has_degraded_copy = true,
            Err(e) => warn!(draft_id = %self.id, error = %e, "Degraded draft save failed"),
        }
    }

    /// Apply the batch policy after a successful cache persist.
    async fn maybe_promote(&mut self) {
        let (change_count, promotable) = {
            let s = self.snapshot.borrow();
            (s.change_count, is_promotable(&s.title, &s.content))
        };
        if !self
            .policy
            .should_promote(change_count, self.last_durable_save.elapsed())
        {
            return;
        }
        if !promotable {
            debug!(
                draft_id = %self.id,
                { CHANGE_COUNT } = change_count,
                "Batch promotion skipped, draft incomplete"
            );
            return;
        }
        if self
            .promoting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        debug!(draft_id = %self.id, { CHANGE_COUNT } = change_count, "Batch threshold reached");
        let _ = self.promote().await;
        self.release_promotion();
    }

    fn release_promotion(&self) {
        self.promoting.store(false, Ordering::SeqCst);
        self.snapshot.send_modify(|s| s.is_promoting = false);
    }

    /// Make sure the cache holds the latest edit.
    async fn ensure_cached(&mut self) -> Result<()> {
        if let Some(payload) = self.debouncer.flush() {
            return self.persist_to_cache(payload).await;
        }
        let current = self.current_payload();
        if !self.persisted || self.last_persisted.as_ref() != Some(&current) {
            return self.persist_to_cache(current).await;
        }
        Ok(())
    }

    /// Explicit promotion. The caller holds the promotion flag.
    async fn save_to_database(&mut self) -> Result<PromotionOutcome> {
        let current = self.current_payload();
        if !is_promotable(&current.title, &current.content) {
            return Err(Error::InvalidInput(
                "a note needs both a title and content".to_string(),
            ));
        }
        self.ensure_cached().await?;
        self.promote().await
    }

    /// Promote the cached draft. The caller holds the promotion flag.
    #[instrument(skip(self), fields(subsystem = "draft", op = "promote", draft_id = %self.id))]
    async fn promote(&mut self) -> Result<PromotionOutcome> {
        self.snapshot.send_modify(|s| {
            s.is_promoting = true;
            s.phase = DraftPhase::PersistingDurable;
        });
        let start = Instant::now();

        match self.backends.notes.create_from_draft(self.id).await {
            Ok(note_id) => {
                self.finish_promotion(true).await;
                info!(
                    draft_id = %self.id,
                    note_id,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Draft promoted to note"
                );
                self.emit(DraftEvent::Promoted {
                    draft_id: self.id,
                    note_id,
                });
                if let Some(callback) = &self.on_promoted {
                    callback(note_id);
                }
                Ok(PromotionOutcome::Promoted(note_id))
            }
            Err(e) if e.is_conflict() => {
                info!(draft_id = %self.id, "Draft already being promoted by another request");
                self.finish_promotion(false).await;
                Ok(PromotionOutcome::PromotedElsewhere)
            }
            Err(e) => {
                warn!(draft_id = %self.id, error = %e, "Draft promotion failed");
                let message = e.to_string();
                self.snapshot.send_modify(|s| {
                    s.phase = DraftPhase::Clean;
                    s.last_error = Some(message.clone());
                });
                self.emit(DraftEvent::PromotionFailed {
                    draft_id: self.id,
                    error: message,
                });
                Err(e)
            }
        }
    }

    async fn finish_promotion(&mut self, delete_cache_entry: bool) {
        self.last_durable_save = Instant::now();
        if delete_cache_entry {
            if let Err(e) = self.backends.cache.delete(self.id).await {
                warn!(draft_id = %self.id, error = %e, "Promoted draft not removed from cache");
            }
        }
        self.forget_remote_state().await;
    }

    /// Reset to "no cache entry": version 1, counters zeroed.
    async fn forget_remote_state(&mut self) {
        if self.has_degraded_copy && self.backends.degraded.remove(self.id).await.is_ok() {
            self.has_degraded_copy = false;
        }
        self.persisted = false;
        self.remote_unknown = false;
        self.last_persisted = None;
        let pending = self.debouncer.is_pending();
        self.snapshot.send_modify(|s| {
            s.version = INITIAL_DRAFT_VERSION;
            s.change_count = 0;
            s.last_error = None;
            s.phase = if pending {
                DraftPhase::Dirty
            } else {
                DraftPhase::Deleted
            };
        });
    }

    async fn reload(&mut self) -> Result<()> {
        self.snapshot.send_modify(|s| s.is_loading = true);
        let result = self.backends.cache.get(self.id).await;
        self.snapshot.send_modify(|s| s.is_loading = false);

        match result? {
            Some(draft) => {
                self.debouncer.cancel();
                self.persisted = true;
                self.remote_unknown = false;
                self.last_persisted = Some(payload_of(&draft));
                self.snapshot.send_modify(|s| {
                    s.title = draft.title;
                    s.content = draft.content;
                    s.version = draft.version;
                    s.last_modified = draft.last_modified;
                    s.phase = DraftPhase::Clean;
                    s.last_error = None;
                });
                Ok(())
            }
            None => Err(Error::NotFound(format!("draft {}", self.id))),
        }
    }

    async fn delete(&mut self) -> Result<()> {
        self.debouncer.cancel();
        self.backends.cache.delete(self.id).await?;
        self.forget_remote_state().await;
        info!(draft_id = %self.id, "Draft deleted");
        Ok(())
    }

    async fn close(&mut self) -> Result<CloseOutcome> {
        let current = self.current_payload();

        if is_promotable(&current.title, &current.content) {
            if self
                .promoting
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return Ok(CloseOutcome::KeptInCache);
            }
            let result = self.save_to_database().await;
            self.release_promotion();
            return Ok(match result {
                Ok(PromotionOutcome::Promoted(note_id)) => CloseOutcome::Promoted(note_id),
                Ok(PromotionOutcome::PromotedElsewhere) => CloseOutcome::PromotedElsewhere,
                Ok(PromotionOutcome::AlreadyInFlight) => CloseOutcome::KeptInCache,
                Err(e) => {
                    warn!(draft_id = %self.id, error = %e, "Closing without promotion");
                    CloseOutcome::KeptInCache
                }
            });
        }

        if !is_cacheable(&current.title, &current.content) {
            self.debouncer.cancel();
            if self.persisted {
                self.backends.cache.delete(self.id).await?;
            }
            self.forget_remote_state().await;
            return Ok(CloseOutcome::Discarded);
        }

        if let Err(e) = self.ensure_cached().await {
            debug!(draft_id = %self.id, error = %e, "Partial draft kept locally on close");
        }
        Ok(CloseOutcome::KeptInCache)
    }
}
