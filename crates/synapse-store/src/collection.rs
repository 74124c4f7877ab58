//! Optimistic collections.
//!
//! Every mutation follows the same protocol:
//!
//! 1. snapshot the current value,
//! 2. apply the mutation to in-memory state and notify subscribers,
//! 3. persist the whole new value under the collection's key,
//! 4. on persist failure, restore the snapshot and record an error.
//!
//! Storage errors never escape this layer; callers get a [`MutationOutcome`].
//! Changes from other contexts arrive through `sync_from_store` and replace
//! in-memory state unconditionally (last writer wins).

use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use synapse_core::KeyedStore;
use synapse_core::logging::STORE_KEY;

/// Result of a collection mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Applied in memory and persisted.
    Applied,
    /// Rejected by the identity predicate; nothing changed.
    Duplicate,
    /// No item with the given identity; nothing changed.
    NotFound,
    /// Rejected before any write (e.g. blank URL).
    Invalid(String),
    /// Persisting failed; in-memory state was restored.
    RolledBack(String),
}

impl MutationOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied)
    }
}

/// Observable state of an optimistic value.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionState<V> {
    pub value: V,
    /// Message of the last failed persist, cleared by the next success.
    pub error: Option<String>,
    /// Whether the value has been loaded from the store at least once.
    pub loaded: bool,
}

/// Optimistic protocol over a single stored value of type `V`.
pub struct OptimisticValue<V> {
    store: Arc<dyn KeyedStore>,
    key: &'static str,
    state: watch::Sender<CollectionState<V>>,
    write_lock: Mutex<()>,
}

impl<V> OptimisticValue<V>
where
    V: Clone + Default + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(store: Arc<dyn KeyedStore>, key: &'static str) -> Self {
        let (state, _) = watch::channel(CollectionState {
            value: V::default(),
            error: None,
            loaded: false,
        });
        Self {
            store,
            key,
            state,
            write_lock: Mutex::new(()),
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn store(&self) -> &Arc<dyn KeyedStore> {
        &self.store
    }

    pub fn get(&self) -> V {
        self.state.borrow().value.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CollectionState<V>> {
        self.state.subscribe()
    }

    /// Read the persisted value. Missing → default; malformed → default and
    /// a warning. A read failure keeps current state and is recorded.
    pub async fn load(&self) {
        match self.store.get_one(self.key).await {
            Ok(raw) => {
                let value = decode_or_default::<V>(self.key, raw);
                self.state.send_modify(|s| {
                    s.value = value;
                    s.error = None;
                    s.loaded = true;
                });
            }
            Err(e) => {
                warn!({ STORE_KEY } = self.key, error = %e, "Failed to load collection");
                self.state.send_modify(|s| s.error = Some(e.to_string()));
            }
        }
    }

    /// Replace in-memory state with a value written by another context.
    pub fn sync_from_store(&self, value: V) {
        self.state.send_modify(|s| {
            s.value = value;
            s.error = None;
            s.loaded = true;
        });
        debug!({ STORE_KEY } = self.key, "Collection synced from store");
    }

    /// Run `f` through the optimistic protocol. `f` returns the next value,
    /// or an outcome that rejects the mutation without touching state.
    pub async fn mutate<F>(&self, op: &'static str, f: F) -> MutationOutcome
    where
        F: FnOnce(&V) -> Result<V, MutationOutcome>,
    {
        let _guard = self.write_lock.lock().await;

        let snapshot = self.get();
        let next = match f(&snapshot) {
            Ok(next) => next,
            Err(rejected) => {
                debug!({ STORE_KEY } = self.key, op, outcome = ?rejected, "Mutation rejected");
                return rejected;
            }
        };

        let encoded = match serde_json::to_value(&next) {
            Ok(v) => v,
            Err(e) => return MutationOutcome::Invalid(e.to_string()),
        };
        self.state.send_modify(|s| s.value = next);

        match self.store.set_one(self.key, encoded).await {
            Ok(()) => {
                self.state.send_modify(|s| s.error = None);
                debug!({ STORE_KEY } = self.key, op, "Mutation persisted");
                MutationOutcome::Applied
            }
            Err(e) => {
                warn!(
                    { STORE_KEY } = self.key,
                    op,
                    error = %e,
                    "Persist failed, rolling back"
                );
                let message = e.to_string();
                self.state.send_modify(|s| {
                    s.value = snapshot;
                    s.error = Some(message.clone());
                });
                MutationOutcome::RolledBack(message)
            }
        }
    }
}

/// Decode a stored value; a missing or malformed value yields `V::default()`.
pub fn decode_or_default<V: DeserializeOwned + Default>(key: &str, raw: Option<Value>) -> V {
    match raw {
        None | Some(Value::Null) => V::default(),
        Some(raw) => serde_json::from_value(raw).unwrap_or_else(|e| {
            warn!({ STORE_KEY } = key, error = %e, "Malformed stored value, using default");
            V::default()
        }),
    }
}

/// Per-collection identity rules.
pub trait CollectionSpec: Send + Sync + 'static {
    type Item: Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// KeyedStore key holding the whole collection.
    const KEY: &'static str;

    /// Identity used by `remove` and `contains`.
    fn id(item: &Self::Item) -> &str;

    /// Whether `candidate` duplicates an existing item.
    fn is_duplicate(existing: &Self::Item, candidate: &Self::Item) -> bool;

    /// Reject malformed items before any write.
    fn validate(_item: &Self::Item) -> Result<(), String> {
        Ok(())
    }
}

/// An ordered list of items persisted under one key.
pub struct OptimisticCollection<S: CollectionSpec> {
    inner: OptimisticValue<Vec<S::Item>>,
    _spec: PhantomData<S>,
}

impl<S: CollectionSpec> OptimisticCollection<S> {
    pub fn new(store: Arc<dyn KeyedStore>) -> Self {
        Self {
            inner: OptimisticValue::new(store, S::KEY),
            _spec: PhantomData,
        }
    }

    pub async fn load(&self) {
        self.inner.load().await
    }

    pub fn items(&self) -> Vec<S::Item> {
        self.inner.get()
    }

    pub fn len(&self) -> usize {
        self.inner.state.borrow().value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.state.borrow().value.iter().any(|i| S::id(i) == id)
    }

    pub fn find(&self, id: &str) -> Option<S::Item> {
        self.inner
            .state
            .borrow()
            .value
            .iter()
            .find(|i| S::id(i) == id)
            .cloned()
    }

    pub fn error(&self) -> Option<String> {
        self.inner.error()
    }

    pub fn subscribe(&self) -> watch::Receiver<CollectionState<Vec<S::Item>>> {
        self.inner.subscribe()
    }

    /// Append `item` unless it duplicates an existing one.
    pub async fn add(&self, item: S::Item) -> MutationOutcome {
        if let Err(reason) = S::validate(&item) {
            return MutationOutcome::Invalid(reason);
        }
        self.inner
            .mutate("add", |items| {
                if items.iter().any(|existing| S::is_duplicate(existing, &item)) {
                    return Err(MutationOutcome::Duplicate);
                }
                let mut next = items.clone();
                next.push(item);
                Ok(next)
            })
            .await
    }

    /// Remove the item with identity `id`.
    pub async fn remove(&self, id: &str) -> MutationOutcome {
        self.inner
            .mutate("remove", |items| {
                if !items.iter().any(|i| S::id(i) == id) {
                    return Err(MutationOutcome::NotFound);
                }
                Ok(items.iter().filter(|i| S::id(i) != id).cloned().collect())
            })
            .await
    }

    /// Replace with the empty collection. Always writes.
    pub async fn clear(&self) -> MutationOutcome {
        self.inner.mutate("clear", |_| Ok(Vec::new())).await
    }

    /// Arbitrary whole-collection mutation through the same protocol.
    pub async fn modify<F>(&self, op: &'static str, f: F) -> MutationOutcome
    where
        F: FnOnce(&Vec<S::Item>) -> Result<Vec<S::Item>, MutationOutcome>,
    {
        self.inner.mutate(op, f).await
    }

    pub fn sync_from_store(&self, items: Vec<S::Item>) {
        self.inner.sync_from_store(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageMedium;

    struct Words;

    impl CollectionSpec for Words {
        type Item = String;
        const KEY: &'static str = "words";

        fn id(item: &String) -> &str {
            item
        }

        fn is_duplicate(existing: &String, candidate: &String) -> bool {
            existing == candidate
        }

        fn validate(item: &String) -> Result<(), String> {
            if item.is_empty() {
                Err("empty".into())
            } else {
                Ok(())
            }
        }
    }

    fn collection(medium: &Arc<StorageMedium>) -> OptimisticCollection<Words> {
        OptimisticCollection::new(Arc::new(medium.context()))
    }

    #[tokio::test]
    async fn test_add_persists_whole_collection() {
        let medium = StorageMedium::in_memory();
        let words = collection(&medium);

        assert!(words.add("a".into()).await.is_applied());
        assert!(words.add("b".into()).await.is_applied());

        let stored = medium.context().get_one("words").await.unwrap();
        assert_eq!(stored, Some(serde_json::json!(["a", "b"])));
    }

    #[tokio::test]
    async fn test_duplicate_and_invalid_do_not_write() {
        let medium = StorageMedium::in_memory();
        let words = collection(&medium);
        let mut other = medium.context().subscribe();

        words.add("a".into()).await;
        assert_eq!(words.add("a".into()).await, MutationOutcome::Duplicate);
        assert!(matches!(words.add(String::new()).await, MutationOutcome::Invalid(_)));

        assert!(other.recv().await.is_some());
        assert!(other.try_recv().is_none());
        assert_eq!(words.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_missing_is_not_found() {
        let medium = StorageMedium::in_memory();
        let words = collection(&medium);
        assert_eq!(words.remove("x").await, MutationOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_failed_persist_restores_snapshot() {
        let medium = StorageMedium::in_memory();
        let words = collection(&medium);
        words.add("a".into()).await;

        medium.set_available(false);
        let outcome = words.add("b".into()).await;
        assert!(matches!(outcome, MutationOutcome::RolledBack(_)));
        assert_eq!(words.items(), vec!["a".to_string()]);
        assert!(words.error().is_some());

        medium.set_available(true);
        assert!(words.add("c".into()).await.is_applied());
        assert!(words.error().is_none());
    }

    #[tokio::test]
    async fn test_load_malformed_value_yields_empty() {
        let medium = StorageMedium::in_memory();
        medium
            .context()
            .set_one("words", serde_json::json!({"not": "a list"}))
            .await
            .unwrap();

        let words = collection(&medium);
        words.load().await;
        assert!(words.is_empty());
        assert!(words.subscribe().borrow().loaded);
    }

    #[tokio::test]
    async fn test_subscribers_see_optimistic_value() {
        let medium = StorageMedium::in_memory();
        let words = collection(&medium);
        let mut rx = words.subscribe();

        words.add("a".into()).await;
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().value, vec!["a".to_string()]);
    }
}
