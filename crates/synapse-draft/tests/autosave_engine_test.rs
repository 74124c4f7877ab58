//! Draft autosave engine tests on paused time.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio::sync::broadcast;
use tokio::time::sleep;
use uuid::Uuid;

use synapse_client::mock::{MockBeacon, MockDraftCache, MockNoteRepository};
use synapse_core::{DegradedDraftStore, Draft, Error};
use synapse_draft::{
    CloseOutcome, DraftAutosaveEngine, DraftBackends, DraftEngineBuilder, DraftEvent, DraftPhase,
    KeyedDegradedStore, PromotionOutcome,
};
use synapse_store::StorageMedium;

/// Longer than the 500ms debounce.
const PAST_DEBOUNCE: Duration = Duration::from_millis(600);

struct Harness {
    cache: MockDraftCache,
    notes: MockNoteRepository,
    beacon: MockBeacon,
    degraded: Arc<KeyedDegradedStore>,
}

impl Harness {
    fn new() -> Self {
        let cache = MockDraftCache::new();
        let notes = MockNoteRepository::new().with_cache(cache.clone());
        Self::with(cache, notes)
    }

    fn with(cache: MockDraftCache, notes: MockNoteRepository) -> Self {
        let medium = StorageMedium::in_memory();
        Self {
            cache,
            notes,
            beacon: MockBeacon::new(),
            degraded: Arc::new(KeyedDegradedStore::new(Arc::new(medium.context()))),
        }
    }

    fn builder(&self) -> DraftEngineBuilder {
        DraftAutosaveEngine::builder(DraftBackends {
            cache: Arc::new(self.cache.clone()),
            notes: Arc::new(self.notes.clone()),
            degraded: self.degraded.clone(),
            beacon: Arc::new(self.beacon.clone()),
        })
    }
}

fn seeded_draft(title: &str, content: &str, version: u32) -> Draft {
    Draft {
        id: Uuid::new_v4(),
        title: title.to_string(),
        content: content.to_string(),
        version,
        last_modified: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
    }
}

fn drain(rx: &mut broadcast::Receiver<DraftEvent>) -> Vec<DraftEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test(start_paused = true)]
async fn test_rapid_edits_coalesce_into_one_persist() {
    let h = Harness::new();
    let engine = h.builder().new_draft();

    engine.handle_title_change("H");
    engine.handle_title_change("He");
    engine.handle_title_change("Hel");
    engine.handle_content_change("World");
    assert_eq!(engine.snapshot().title, "Hel");
    assert_eq!(engine.snapshot().phase, DraftPhase::Dirty);

    sleep(PAST_DEBOUNCE).await;

    assert_eq!(h.cache.save_call_count(), 1);
    let stored = h.cache.stored(engine.id()).unwrap();
    assert_eq!(stored.title, "Hel");
    assert_eq!(stored.content, "World");
    assert_eq!(engine.snapshot().phase, DraftPhase::Clean);
}

#[tokio::test(start_paused = true)]
async fn test_each_edit_restarts_the_timer() {
    let h = Harness::new();
    let engine = h.builder().new_draft();

    engine.handle_title_change("a");
    sleep(Duration::from_millis(300)).await;
    engine.handle_title_change("ab");
    sleep(Duration::from_millis(300)).await;
    assert_eq!(h.cache.save_call_count(), 0);

    sleep(Duration::from_millis(300)).await;
    assert_eq!(h.cache.save_call_count(), 1);
    assert_eq!(h.cache.stored(engine.id()).unwrap().title, "ab");
}

#[tokio::test(start_paused = true)]
async fn test_versions_increase_with_each_persist() {
    let h = Harness::new();
    let engine = h.builder().new_draft();
    let mut events = engine.events();

    engine.handle_title_change("one");
    sleep(PAST_DEBOUNCE).await;
    assert_eq!(engine.snapshot().version, 1);

    engine.handle_title_change("two");
    sleep(PAST_DEBOUNCE).await;
    assert_eq!(engine.snapshot().version, 2);
    assert_eq!(engine.snapshot().change_count, 2);

    let calls = h.cache.save_calls();
    assert_eq!(calls[0].version, None);
    assert_eq!(calls[1].version, Some(1));

    let versions: Vec<u32> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            DraftEvent::CachePersisted { version, .. } => Some(version),
            _ => None,
        })
        .collect();
    assert_eq!(versions, vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_empty_draft_is_not_cached() {
    let h = Harness::new();
    let engine = h.builder().new_draft();

    engine.handle_title_change("   ");
    sleep(PAST_DEBOUNCE).await;

    assert_eq!(h.cache.save_call_count(), 0);
    assert_eq!(engine.snapshot().phase, DraftPhase::Clean);
}

#[tokio::test(start_paused = true)]
async fn test_cache_failure_keeps_local_edit() {
    let seeded = seeded_draft("Before", "body", 3);
    let h = Harness::with(
        MockDraftCache::new().with_draft(seeded.clone()),
        MockNoteRepository::new(),
    );
    let engine = h.builder().open(seeded.id).await.unwrap();
    let mut events = engine.events();

    h.cache.set_fail_saves(true);
    engine.handle_title_change("Hello");
    sleep(PAST_DEBOUNCE).await;

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.title, "Hello");
    assert_eq!(snapshot.phase, DraftPhase::Dirty);
    assert!(snapshot.last_error.is_some());
    assert!(!snapshot.is_saving);

    assert_eq!(h.cache.stored(seeded.id).unwrap().title, "Before");
    assert!(matches!(
        drain(&mut events).as_slice(),
        [DraftEvent::CacheFallback { .. }]
    ));

    let local = h.degraded.load(seeded.id).await.unwrap().unwrap();
    assert_eq!(local.title, "Hello");
    assert_eq!(local.content, "body");
}

#[tokio::test(start_paused = true)]
async fn test_next_successful_persist_removes_degraded_copy() {
    let h = Harness::new();
    let engine = h.builder().new_draft();

    h.cache.set_fail_saves(true);
    engine.handle_title_change("Hello");
    sleep(PAST_DEBOUNCE).await;
    assert!(h.degraded.load(engine.id()).await.unwrap().is_some());

    h.cache.set_fail_saves(false);
    engine.handle_content_change("World");
    sleep(PAST_DEBOUNCE).await;

    assert_eq!(h.cache.stored(engine.id()).unwrap().title, "Hello");
    assert!(h.degraded.load(engine.id()).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_version_conflict_adopts_remote_version() {
    let seeded = seeded_draft("Before", "body", 3);
    let h = Harness::with(
        MockDraftCache::new().with_draft(seeded.clone()),
        MockNoteRepository::new(),
    );
    let engine = h.builder().open(seeded.id).await.unwrap();
    let mut events = engine.events();

    h.cache.bump_version(seeded.id, "Remote", "other");
    engine.handle_title_change("Local");
    sleep(PAST_DEBOUNCE).await;

    assert_eq!(
        drain(&mut events),
        vec![DraftEvent::Conflict {
            draft_id: seeded.id,
            local_version: 3,
            remote_version: Some(4),
        }]
    );
    assert_eq!(engine.snapshot().title, "Local");
    assert_eq!(engine.snapshot().version, 4);

    engine.handle_title_change("Local again");
    sleep(PAST_DEBOUNCE).await;

    let stored = h.cache.stored(seeded.id).unwrap();
    assert_eq!(stored.title, "Local again");
    assert_eq!(stored.version, 5);
}

#[tokio::test(start_paused = true)]
async fn test_fiftieth_persist_triggers_promotion() {
    let h = Harness::new();
    let promoted = Arc::new(AtomicI64::new(0));
    let seen = Arc::clone(&promoted);
    let engine = h
        .builder()
        .on_promoted(move |note_id| seen.store(note_id, Ordering::SeqCst))
        .new_draft();

    engine.handle_title_change("T");
    for i in 0..49 {
        engine.handle_content_change(format!("c{}", i));
        sleep(PAST_DEBOUNCE).await;
    }
    assert_eq!(engine.snapshot().change_count, 49);
    assert_eq!(h.notes.promote_call_count(), 0);

    engine.handle_content_change("c49");
    sleep(PAST_DEBOUNCE).await;

    assert_eq!(h.notes.promote_call_count(), 1);
    let note_id = promoted.load(Ordering::SeqCst);
    assert_eq!(h.notes.note(note_id).unwrap().content, "c49");

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.change_count, 0);
    assert_eq!(snapshot.version, 1);
    assert_eq!(snapshot.phase, DraftPhase::Deleted);
    assert!(h.cache.stored(engine.id()).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_interval_elapsed_triggers_promotion() {
    let h = Harness::new();
    let engine = h.builder().new_draft();

    engine.handle_title_change("T");
    engine.handle_content_change("body");
    sleep(PAST_DEBOUNCE).await;
    assert_eq!(h.notes.promote_call_count(), 0);

    sleep(Duration::from_secs(300)).await;
    engine.handle_content_change("body 2");
    sleep(PAST_DEBOUNCE).await;

    assert_eq!(h.notes.promote_call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_batch_promotion_skipped_without_content() {
    let h = Harness::new();
    let engine = h.builder().new_draft();

    for i in 0..50 {
        engine.handle_title_change(format!("t{}", i));
        sleep(PAST_DEBOUNCE).await;
    }

    assert_eq!(engine.snapshot().change_count, 50);
    assert_eq!(h.notes.promote_call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_save_to_database_requires_title_and_content() {
    let h = Harness::new();
    let engine = h.builder().new_draft();

    engine.handle_title_change("Only a title");
    let result = engine.save_to_database().await;

    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert_eq!(h.notes.promote_call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_save_to_database_flushes_then_promotes() {
    let h = Harness::new();
    let engine = h.builder().new_draft();
    let mut events = engine.events();

    engine.handle_title_change("Title");
    engine.handle_content_change("Body");
    let outcome = engine.save_to_database().await.unwrap();

    let PromotionOutcome::Promoted(note_id) = outcome else {
        panic!("expected promotion, got {:?}", outcome);
    };
    let note = h.notes.note(note_id).unwrap();
    assert_eq!(note.title, "Title");
    assert_eq!(note.content, "Body");

    assert_eq!(h.cache.delete_calls(), vec![engine.id()]);
    assert!(h.cache.stored(engine.id()).is_none());
    assert!(drain(&mut events).contains(&DraftEvent::Promoted {
        draft_id: engine.id(),
        note_id,
    }));

    let snapshot = engine.snapshot();
    assert!(!snapshot.is_promoting);
    assert_eq!(snapshot.phase, DraftPhase::Deleted);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_save_is_already_in_flight() {
    let cache = MockDraftCache::new();
    let notes = MockNoteRepository::new()
        .with_cache(cache.clone())
        .with_promotion_latency(Duration::from_secs(1));
    let h = Harness::with(cache, notes);
    let engine = h.builder().new_draft();

    engine.handle_title_change("Title");
    engine.handle_content_change("Body");
    engine.flush().await.unwrap();

    let (first, (second, beacon_sent)) = tokio::join!(engine.save_to_database(), async {
        sleep(Duration::from_millis(10)).await;
        (engine.save_to_database().await, engine.on_unload())
    });

    assert!(matches!(first, Ok(PromotionOutcome::Promoted(_))));
    assert_eq!(second.unwrap(), PromotionOutcome::AlreadyInFlight);
    assert!(!beacon_sent);
    assert!(h.beacon.calls().is_empty());
    assert_eq!(h.notes.promote_call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_conflict_from_durable_store_is_promoted_elsewhere() {
    let h = Harness::new();
    let engine = h.builder().new_draft();

    engine.handle_title_change("Title");
    engine.handle_content_change("Body");
    h.notes.set_conflict_promotions(true);

    assert_eq!(
        engine.save_to_database().await.unwrap(),
        PromotionOutcome::PromotedElsewhere
    );
    assert!(h.cache.delete_calls().is_empty());
    assert!(h.cache.stored(engine.id()).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_failed_promotion_keeps_cache_and_can_retry() {
    let h = Harness::new();
    let engine = h.builder().new_draft();
    let mut events = engine.events();

    engine.handle_title_change("Title");
    engine.handle_content_change("Body");
    h.notes.set_fail_promotions(true);

    assert!(engine.save_to_database().await.is_err());
    assert!(h.cache.stored(engine.id()).is_some());
    assert!(drain(&mut events)
        .iter()
        .any(|e| matches!(e, DraftEvent::PromotionFailed { .. })));
    assert!(!engine.snapshot().is_promoting);

    h.notes.set_fail_promotions(false);
    assert!(matches!(
        engine.save_to_database().await,
        Ok(PromotionOutcome::Promoted(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_unload_sends_beacon_only_when_promotable() {
    let h = Harness::new();
    let engine = h.builder().new_draft();

    engine.handle_title_change("Title");
    assert!(!engine.on_unload());

    engine.handle_content_change("Body");
    assert!(engine.on_unload());

    let calls = h.beacon.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].draft_id, engine.id());
    assert_eq!(calls[0].title, "Title");
    assert_eq!(calls[0].content, "Body");
}

#[tokio::test(start_paused = true)]
async fn test_close_promotes_complete_draft() {
    let h = Harness::new();
    let engine = h.builder().new_draft();
    let id = engine.id();

    engine.handle_title_change("Title");
    engine.handle_content_change("Body");

    let outcome = engine.close().await.unwrap();
    assert!(matches!(outcome, CloseOutcome::Promoted(_)));
    assert!(h.cache.stored(id).is_none());
    assert_eq!(h.notes.note_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_close_discards_cleared_draft() {
    let h = Harness::new();
    let engine = h.builder().new_draft();
    let id = engine.id();

    engine.handle_title_change("typo");
    sleep(PAST_DEBOUNCE).await;
    assert!(h.cache.stored(id).is_some());

    engine.handle_title_change("");
    assert_eq!(engine.close().await.unwrap(), CloseOutcome::Discarded);
    assert_eq!(h.cache.delete_calls(), vec![id]);
    assert!(h.cache.stored(id).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_close_untouched_draft_makes_no_calls() {
    let h = Harness::new();
    let engine = h.builder().new_draft();

    assert_eq!(engine.close().await.unwrap(), CloseOutcome::Discarded);
    assert_eq!(h.cache.save_call_count(), 0);
    assert!(h.cache.delete_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_close_keeps_partial_draft_in_cache() {
    let h = Harness::new();
    let engine = h.builder().new_draft();
    let id = engine.id();

    engine.handle_title_change("Partial");
    assert_eq!(engine.close().await.unwrap(), CloseOutcome::KeptInCache);

    assert_eq!(h.cache.stored(id).unwrap().title, "Partial");
    assert_eq!(h.notes.promote_call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_close_with_failed_promotion_keeps_draft() {
    let h = Harness::new();
    let engine = h.builder().new_draft();
    let id = engine.id();

    engine.handle_title_change("Title");
    engine.handle_content_change("Body");
    h.notes.set_fail_promotions(true);

    assert_eq!(engine.close().await.unwrap(), CloseOutcome::KeptInCache);
    assert!(h.cache.stored(id).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_engine_flushes_pending_edit() {
    let h = Harness::new();
    let engine = h.builder().new_draft();
    let id = engine.id();

    engine.handle_title_change("Last words");
    drop(engine);
    sleep(Duration::from_millis(10)).await;

    assert_eq!(h.cache.stored(id).unwrap().title, "Last words");
}

#[tokio::test(start_paused = true)]
async fn test_delete_draft_removes_cache_entry() {
    let h = Harness::new();
    let engine = h.builder().new_draft();

    engine.handle_title_change("Title");
    engine.flush().await.unwrap();
    engine.delete_draft().await.unwrap();

    assert!(h.cache.stored(engine.id()).is_none());
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.phase, DraftPhase::Deleted);
    assert_eq!(snapshot.version, 1);
}

#[tokio::test(start_paused = true)]
async fn test_delete_failure_is_reported() {
    let h = Harness::new();
    let engine = h.builder().new_draft();

    engine.handle_title_change("Title");
    engine.flush().await.unwrap();
    h.cache.set_fail_deletes(true);

    assert!(engine.delete_draft().await.is_err());
    assert!(h.cache.stored(engine.id()).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_reload_takes_remote_copy_and_drops_pending_edit() {
    let seeded = seeded_draft("Before", "body", 3);
    let h = Harness::with(
        MockDraftCache::new().with_draft(seeded.clone()),
        MockNoteRepository::new(),
    );
    let engine = h.builder().open(seeded.id).await.unwrap();

    engine.handle_title_change("Local");
    h.cache.bump_version(seeded.id, "Remote", "other");
    engine.reload().await.unwrap();

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.title, "Remote");
    assert_eq!(snapshot.version, 4);
    assert_eq!(snapshot.phase, DraftPhase::Clean);
    assert!(!snapshot.is_loading);

    sleep(PAST_DEBOUNCE).await;
    assert_eq!(h.cache.save_call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reload_missing_draft_is_not_found() {
    let h = Harness::new();
    let engine = h.builder().new_draft();

    assert!(matches!(engine.reload().await, Err(Error::NotFound(_))));
}

#[tokio::test(start_paused = true)]
async fn test_open_missing_draft_starts_empty() {
    let h = Harness::new();
    let id = Uuid::new_v4();
    let engine = h.builder().open(id).await.unwrap();

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.id, id);
    assert_eq!(snapshot.version, 1);
    assert!(snapshot.title.is_empty());
    assert_eq!(snapshot.phase, DraftPhase::Clean);
}

#[tokio::test(start_paused = true)]
async fn test_open_restores_newer_degraded_copy() {
    let seeded = seeded_draft("Before", "body", 3);
    let h = Harness::with(
        MockDraftCache::new().with_draft(seeded.clone()),
        MockNoteRepository::new(),
    );
    let local = Draft {
        title: "Unsaved".to_string(),
        last_modified: Utc::now(),
        ..seeded.clone()
    };
    h.degraded.save(&local).await.unwrap();

    let engine = h.builder().open(seeded.id).await.unwrap();
    assert_eq!(engine.snapshot().title, "Unsaved");
    assert_eq!(engine.snapshot().phase, DraftPhase::Dirty);

    sleep(PAST_DEBOUNCE).await;

    let stored = h.cache.stored(seeded.id).unwrap();
    assert_eq!(stored.title, "Unsaved");
    assert_eq!(stored.version, 4);
    assert!(h.degraded.load(seeded.id).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_open_falls_back_when_cache_unreachable() {
    let h = Harness::new();
    let mut local = Draft::empty(Uuid::new_v4());
    local.title = "Offline".to_string();
    h.degraded.save(&local).await.unwrap();
    h.cache.set_fail_gets(true);

    let engine = h.builder().open(local.id).await.unwrap();
    assert_eq!(engine.snapshot().title, "Offline");

    sleep(PAST_DEBOUNCE).await;
    assert_eq!(h.cache.stored(local.id).unwrap().version, 1);
}

#[tokio::test(start_paused = true)]
async fn test_open_drops_older_degraded_copy() {
    let seeded = seeded_draft("Current", "body", 3);
    let cache = MockDraftCache::new().with_draft(seeded.clone());
    let h = Harness::with(
        cache.clone(),
        MockNoteRepository::new().with_cache(cache),
    );
    let stale = Draft {
        title: "Stale".to_string(),
        last_modified: Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap(),
        ..seeded.clone()
    };
    h.degraded.save(&stale).await.unwrap();

    let engine = h.builder().open(seeded.id).await.unwrap();
    assert_eq!(engine.snapshot().title, "Current");
    assert!(h.degraded.load(seeded.id).await.unwrap().is_none());

    let outcome = engine.close().await.unwrap();
    assert!(matches!(outcome, CloseOutcome::Promoted(_)));
    assert!(h.cache.stored(seeded.id).is_none());

    let reopened = h.builder().open(seeded.id).await.unwrap();
    assert!(reopened.snapshot().title.is_empty());
    sleep(PAST_DEBOUNCE).await;
    assert!(h.cache.stored(seeded.id).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_first_persist_after_failed_open_is_version_checked() {
    let seeded = seeded_draft("Remote title", "remote body", 3);
    let h = Harness::with(
        MockDraftCache::new().with_draft(seeded.clone()),
        MockNoteRepository::new(),
    );
    h.cache.set_fail_gets(true);

    let engine = h.builder().open(seeded.id).await.unwrap();
    engine.handle_title_change("X");
    sleep(PAST_DEBOUNCE).await;

    assert_eq!(h.cache.save_calls()[0].version, Some(1));
    let stored = h.cache.stored(seeded.id).unwrap();
    assert_eq!(stored.title, "Remote title");
    assert_eq!(stored.content, "remote body");
    assert_eq!(stored.version, 3);

    let local = h.degraded.load(seeded.id).await.unwrap().unwrap();
    assert_eq!(local.title, "X");
    assert_eq!(engine.snapshot().phase, DraftPhase::Dirty);
}

#[tokio::test(start_paused = true)]
async fn test_edit_during_promotion_is_saved_afterwards() {
    let cache = MockDraftCache::new();
    let notes = MockNoteRepository::new()
        .with_cache(cache.clone())
        .with_promotion_latency(Duration::from_secs(1));
    let h = Harness::with(cache, notes);
    let engine = h.builder().new_draft();
    let id = engine.id();

    engine.handle_title_change("Title");
    engine.handle_content_change("Body");
    engine.flush().await.unwrap();

    let (promoted, phase_during) = tokio::join!(engine.save_to_database(), async {
        sleep(Duration::from_millis(10)).await;
        engine.handle_content_change("Body, continued");
        engine.snapshot().phase
    });

    assert!(matches!(promoted, Ok(PromotionOutcome::Promoted(_))));
    assert_eq!(phase_during, DraftPhase::PersistingDurable);

    sleep(PAST_DEBOUNCE).await;
    let stored = h.cache.stored(id).unwrap();
    assert_eq!(stored.content, "Body, continued");
    assert_eq!(stored.version, 1);
    assert_eq!(engine.snapshot().phase, DraftPhase::Clean);
}
