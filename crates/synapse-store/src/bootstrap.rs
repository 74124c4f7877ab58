//! Startup preparation of the shared store.

use std::collections::HashMap;

use serde_json::{json, Value};
use tracing::{info, warn};

use synapse_core::defaults::{KEY_COLLECTED_PAGES, KEY_OVERLAY_STATE, LEGACY_KEYS};
use synapse_core::{KeyedStore, OverlayState, Result};

/// Copy values stored under legacy key names to their current names, then
/// remove the legacy keys. A current key that already holds a value wins.
/// Returns how many values were copied.
pub async fn migrate_legacy_keys(store: &dyn KeyedStore) -> Result<usize> {
    let legacy: Vec<&str> = LEGACY_KEYS.iter().map(|(old, _)| *old).collect();
    let current: Vec<&str> = LEGACY_KEYS.iter().map(|(_, new)| *new).collect();

    let found = store.get(&legacy).await?;
    if found.is_empty() {
        return Ok(0);
    }
    let existing = store.get(&current).await?;

    let copies: HashMap<String, Value> = LEGACY_KEYS
        .iter()
        .filter(|(_, new)| !existing.contains_key(*new))
        .filter_map(|(old, new)| found.get(*old).map(|v| (new.to_string(), v.clone())))
        .collect();
    let copied = copies.len();

    if !copies.is_empty() {
        store.set(copies).await?;
    }
    let stale: Vec<&str> = legacy
        .into_iter()
        .filter(|k| found.contains_key(*k))
        .collect();
    store.remove(&stale).await?;

    info!(copied, removed = stale.len(), "Legacy storage keys migrated");
    Ok(copied)
}

/// Migrate legacy keys, then write defaults for missing keys. Migration
/// failures are logged and do not abort startup.
pub async fn initialize_storage(store: &dyn KeyedStore) -> Result<()> {
    if let Err(e) = migrate_legacy_keys(store).await {
        warn!(error = %e, "Legacy key migration failed, continuing");
    }

    let existing = store.get(&[KEY_COLLECTED_PAGES, KEY_OVERLAY_STATE]).await?;
    let mut defaults = HashMap::new();
    if !existing.contains_key(KEY_COLLECTED_PAGES) {
        defaults.insert(KEY_COLLECTED_PAGES.to_string(), json!([]));
    }
    if !existing.contains_key(KEY_OVERLAY_STATE) {
        defaults.insert(
            KEY_OVERLAY_STATE.to_string(),
            serde_json::to_value(OverlayState::default())?,
        );
    }
    if !defaults.is_empty() {
        store.set(defaults).await?;
    }
    Ok(())
}
