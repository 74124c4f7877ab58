//! When drafts are sent where.

use std::time::Duration;

use synapse_core::SyncConfig;

/// A draft may go to the ephemeral cache when either field has content.
pub fn is_cacheable(title: &str, content: &str) -> bool {
    !title.trim().is_empty() || !content.trim().is_empty()
}

/// A draft may become a note only when both fields have content.
pub fn is_promotable(title: &str, content: &str) -> bool {
    !title.trim().is_empty() && !content.trim().is_empty()
}

/// Thresholds that force a durable promotion after a cache persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    pub change_threshold: u32,
    pub interval: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

impl BatchPolicy {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            change_threshold: config.batch_change_threshold,
            interval: config.batch_interval(),
        }
    }

    /// Promote once enough changes piled up or enough time passed since the
    /// last durable save.
    pub fn should_promote(&self, change_count: u32, since_durable_save: Duration) -> bool {
        change_count >= self.change_threshold || since_durable_save >= self.interval
    }
}
