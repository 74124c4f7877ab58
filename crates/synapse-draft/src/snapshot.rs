//! Observable draft state and engine events.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use synapse_core::defaults::INITIAL_DRAFT_VERSION;
use synapse_core::Draft;

/// Where a draft's latest edit currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftPhase {
    /// The cache holds the latest edit (or there is nothing to save).
    Clean,
    /// Edited since the last successful cache persist.
    Dirty,
    /// A cache persist is in flight.
    Persisting,
    /// A durable promotion is in flight.
    PersistingDurable,
    /// Promoted or discarded; the cache entry is gone.
    Deleted,
}

/// Everything the UI reads about an open draft.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftSnapshot {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    /// Last version acknowledged by the cache.
    pub version: u32,
    pub last_modified: DateTime<Utc>,
    pub phase: DraftPhase,
    /// Successful cache persists since the last durable save.
    pub change_count: u32,
    pub is_loading: bool,
    pub is_saving: bool,
    pub is_promoting: bool,
    pub last_error: Option<String>,
}

impl DraftSnapshot {
    pub(crate) fn from_draft(draft: &Draft, phase: DraftPhase) -> Self {
        Self {
            id: draft.id,
            title: draft.title.clone(),
            content: draft.content.clone(),
            version: draft.version.max(INITIAL_DRAFT_VERSION),
            last_modified: draft.last_modified,
            phase,
            change_count: 0,
            is_loading: false,
            is_saving: false,
            is_promoting: false,
            last_error: None,
        }
    }

    /// Record a pending edit. A running promotion keeps its phase until it
    /// settles.
    pub(crate) fn mark_dirty(&mut self) {
        if self.phase != DraftPhase::PersistingDurable {
            self.phase = DraftPhase::Dirty;
        }
    }

    pub(crate) fn payload(&self) -> DraftPayload {
        DraftPayload {
            title: self.title.clone(),
            content: self.content.clone(),
        }
    }
}

/// The edited fields sent to the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftPayload {
    pub title: String,
    pub content: String,
}

/// Notifications for toasts and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftEvent {
    /// The cache accepted an edit.
    CachePersisted { draft_id: Uuid, version: u32 },
    /// The cache rejected an edit; a degraded local copy was written.
    CacheFallback { draft_id: Uuid, error: String },
    /// The cache rejected a stale version.
    Conflict {
        draft_id: Uuid,
        local_version: u32,
        remote_version: Option<u32>,
    },
    /// The draft became a note.
    Promoted { draft_id: Uuid, note_id: i64 },
    /// Promotion failed; the cache entry is intact.
    PromotionFailed { draft_id: Uuid, error: String },
}

/// Result of a durable promotion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionOutcome {
    Promoted(i64),
    /// Another promotion of this draft is already running in this engine.
    AlreadyInFlight,
    /// The backend reported another request (e.g. the unload beacon) is
    /// promoting this draft.
    PromotedElsewhere,
}

/// Result of closing the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Promoted(i64),
    PromotedElsewhere,
    /// Not promoted; the cache (or degraded copy) keeps the draft.
    KeptInCache,
    /// Both fields were empty; the cache entry was removed.
    Discarded,
}
