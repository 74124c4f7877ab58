//! Shared storage medium.
//!
//! A [`StorageMedium`] holds the key→JSON map that every execution context
//! reads and writes through its own [`ContextStore`](crate::ContextStore)
//! handle. Writes are whole-value replacements: the medium commits them
//! (to disk first when file-backed), then announces one [`StorageChange`]
//! per key on a broadcast channel.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, trace, warn};

use synapse_core::defaults::CHANGE_CHANNEL_CAPACITY;
use synapse_core::{ContextId, Error, Result, StorageChange};

use crate::ContextStore;

/// Key-value medium shared by every context in the process.
pub struct StorageMedium {
    values: Mutex<HashMap<String, Value>>,
    tx: broadcast::Sender<StorageChange>,
    path: Option<PathBuf>,
    available: AtomicBool,
}

impl StorageMedium {
    /// Volatile medium; values live as long as the process.
    pub fn in_memory() -> Arc<Self> {
        Arc::new(Self::with_values(HashMap::new(), None))
    }

    /// File-backed medium. A missing file starts empty; a corrupt file is an
    /// error so that existing data is never silently overwritten.
    pub async fn open(path: impl AsRef<Path>) -> Result<Arc<Self>> {
        let path = path.as_ref().to_path_buf();
        let values = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => HashMap::new(),
            Ok(bytes) => serde_json::from_slice::<HashMap<String, Value>>(&bytes).map_err(|e| {
                Error::Storage(format!("corrupt store file {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), keys = values.len(), "Storage medium opened");
        Ok(Arc::new(Self::with_values(values, Some(path))))
    }

    fn with_values(values: HashMap<String, Value>, path: Option<PathBuf>) -> Self {
        let (tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            values: Mutex::new(values),
            tx,
            path,
            available: AtomicBool::new(true),
        }
    }

    /// Handle for a new execution context.
    pub fn context(self: &Arc<Self>) -> ContextStore {
        ContextStore::new(Arc::clone(self), ContextId::new())
    }

    /// Mark the medium (un)available. While unavailable, writes fail with
    /// `Error::StorageUnavailable`; reads keep working.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
        debug!(available, "Storage medium availability changed");
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Raw change stream, including every context's own writes.
    pub(crate) fn raw_subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.tx.subscribe()
    }

    pub(crate) async fn read(&self, keys: &[&str]) -> HashMap<String, Value> {
        let values = self.values.lock().await;
        keys.iter()
            .filter_map(|k| values.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect()
    }

    pub(crate) async fn write(
        &self,
        origin: ContextId,
        items: HashMap<String, Value>,
    ) -> Result<()> {
        self.ensure_available()?;
        let mut values = self.values.lock().await;

        let mut next = values.clone();
        let mut changes = Vec::with_capacity(items.len());
        for (key, value) in items {
            let old_value = next.insert(key.clone(), value.clone());
            changes.push(StorageChange {
                key,
                new_value: Some(value),
                old_value,
                origin,
            });
        }

        self.commit(&mut values, next, changes).await
    }

    pub(crate) async fn delete(&self, origin: ContextId, keys: &[&str]) -> Result<()> {
        self.ensure_available()?;
        let mut values = self.values.lock().await;

        let mut next = values.clone();
        let changes: Vec<StorageChange> = keys
            .iter()
            .filter_map(|key| {
                next.remove(*key).map(|old| StorageChange {
                    key: key.to_string(),
                    new_value: None,
                    old_value: Some(old),
                    origin,
                })
            })
            .collect();
        if changes.is_empty() {
            return Ok(());
        }

        self.commit(&mut values, next, changes).await
    }

    fn ensure_available(&self) -> Result<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(Error::StorageUnavailable(
                "storage medium is not accepting writes".to_string(),
            ))
        }
    }

    async fn commit(
        &self,
        values: &mut HashMap<String, Value>,
        next: HashMap<String, Value>,
        changes: Vec<StorageChange>,
    ) -> Result<()> {
        if let Some(path) = &self.path {
            persist_file(path, &next).await?;
        }
        *values = next;

        let subscriber_count = self.tx.receiver_count();
        for change in changes {
            trace!(
                store_key = %change.key,
                context_id = %change.origin,
                subscriber_count,
                "Storage change committed"
            );
            let _ = self.tx.send(change);
        }
        Ok(())
    }
}

/// Atomic replace: write a sibling temp file, then rename over the target.
async fn persist_file(path: &Path, values: &HashMap<String, Value>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(values)?;
    let tmp = path.with_extension("tmp");
    if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
        warn!(path = %tmp.display(), error = %e, "Failed to write store temp file");
        return Err(Error::Storage(format!("write {}: {}", tmp.display(), e)));
    }
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| Error::Storage(format!("rename {}: {}", path.display(), e)))
}
