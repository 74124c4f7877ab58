//! Integration tests for saving collected pages as a batch.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use synapse_core::{
    ContextId, Error, KeyedStore, PageSaver, RelayMessage, Result, SavePageResponse,
    SaveRequestStatus,
};
use synapse_store::{
    BroadcastRelay, PageCollection, SaveBatchCoordinator, SaveRequestCollection, StorageMedium,
};

#[derive(Default)]
struct RecordingSaver {
    calls: Mutex<Vec<Vec<String>>>,
    fail: bool,
}

#[async_trait]
impl PageSaver for RecordingSaver {
    async fn save_pages(&self, urls: &[String]) -> Result<SavePageResponse> {
        self.calls.lock().unwrap().push(urls.to_vec());
        if self.fail {
            return Err(Error::Request("summarizer down".into()));
        }
        Ok(SavePageResponse {
            success: true,
            message: "ok".into(),
            note_id: Some(7),
        })
    }
}

struct Fixture {
    pages: Arc<PageCollection>,
    requests: Arc<SaveRequestCollection>,
    relay: Arc<BroadcastRelay>,
    saver: Arc<RecordingSaver>,
    coordinator: SaveBatchCoordinator,
}

fn fixture(fail: bool) -> Fixture {
    let medium = StorageMedium::in_memory();
    let store: Arc<dyn KeyedStore> = Arc::new(medium.context());
    let pages = Arc::new(PageCollection::new(Arc::clone(&store)));
    let requests = Arc::new(SaveRequestCollection::new(store, Duration::from_secs(3)));
    let relay = Arc::new(BroadcastRelay::new());
    let saver = Arc::new(RecordingSaver {
        fail,
        ..Default::default()
    });
    let coordinator = SaveBatchCoordinator::new(
        Arc::clone(&pages),
        Arc::clone(&requests),
        Arc::clone(&relay),
        saver.clone(),
    );
    Fixture {
        pages,
        requests,
        relay,
        saver,
        coordinator,
    }
}

#[tokio::test]
async fn test_empty_collection_rejected_before_network() {
    let f = fixture(false);
    let err = f.coordinator.save_collected().await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(f.saver.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_successful_batch_clears_pages_and_notifies_tabs() {
    let f = fixture(false);
    let mut tab = f.relay.register(ContextId::new());
    f.pages.add("https://a.com".into()).await;
    f.pages.add("https://b.com".into()).await;

    let report = f.coordinator.save_collected().await.unwrap();

    assert!(report.success);
    assert_eq!(report.note_id, Some(7));
    assert!(f.pages.is_empty());
    assert_eq!(f.saver.calls.lock().unwrap().len(), 1);
    assert!(f
        .requests
        .items()
        .iter()
        .all(|r| r.status == SaveRequestStatus::Success && r.batch_id == report.batch_id));

    assert!(matches!(
        tab.try_recv().unwrap(),
        RelayMessage::BatchStarted { .. }
    ));
    match tab.try_recv().unwrap() {
        RelayMessage::BatchCompleted { success, urls, .. } => {
            assert!(success);
            assert_eq!(urls.len(), 2);
        }
        other => panic!("unexpected message: {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_batch_keeps_pages_and_marks_errors() {
    let f = fixture(true);
    f.pages.add("https://a.com".into()).await;

    let report = f.coordinator.save_collected().await.unwrap();

    assert!(!report.success);
    assert!(report.error.as_deref().unwrap().contains("summarizer down"));
    assert_eq!(f.pages.len(), 1);
    let request = &f.requests.items()[0];
    assert_eq!(request.status, SaveRequestStatus::Error);
    assert!(request.error.is_some());
}

#[tokio::test]
async fn test_other_tab_mirrors_batch_from_relay() {
    let f = fixture(false);
    let mut tab = f.relay.register(ContextId::new());
    f.pages.add("https://a.com".into()).await;
    f.coordinator.save_collected().await.unwrap();

    let other = SaveRequestCollection::new(
        Arc::new(StorageMedium::in_memory().context()),
        Duration::from_secs(3),
    );
    while let Ok(message) = tab.try_recv() {
        other.apply_relay(&message).await;
    }

    let mirrored = other.items();
    assert_eq!(mirrored.len(), 1);
    assert_eq!(mirrored[0].id, f.requests.items()[0].id);
    assert_eq!(mirrored[0].status, SaveRequestStatus::Success);
}
