//! Data models shared across synapse crates.
//!
//! Wire names follow the REST backend (camelCase JSON); Rust field names are
//! snake_case.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults;

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

// =============================================================================
// DRAFTS AND NOTES
// =============================================================================

/// An in-progress note held in the remote ephemeral cache.
///
/// `version` is the optimistic-locking counter: the cache increments it by
/// exactly one on every accepted write and rejects writes carrying a stale
/// value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    #[serde(rename = "noteId")]
    pub id: Uuid,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub version: u32,
    pub last_modified: DateTime<Utc>,
}

impl Draft {
    /// A draft that has never been persisted.
    pub fn empty(id: Uuid) -> Self {
        Self {
            id,
            title: String::new(),
            content: String::new(),
            version: defaults::INITIAL_DRAFT_VERSION,
            last_modified: Utc::now(),
        }
    }
}

/// Create-or-update request sent to the ephemeral draft cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRequest {
    #[serde(rename = "noteId", skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

impl DraftRequest {
    /// Full-payload request for an existing draft.
    pub fn new(id: Uuid, title: impl Into<String>, content: impl Into<String>, version: u32) -> Self {
        Self {
            id: Some(id),
            title: Some(title.into()),
            content: Some(content.into()),
            version: Some(version),
        }
    }
}

/// Listing of the current user's drafts, most recently modified first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftList {
    pub drafts: Vec<Draft>,
    pub total_count: usize,
}

/// A durably stored note. The backend assigns `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(alias = "noteId")]
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request for creating or updating a note directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteContent {
    pub title: String,
    pub content: String,
}

/// Response body of the durable create-from-draft endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CreatedNote {
    #[serde(alias = "noteId")]
    pub id: i64,
}

// =============================================================================
// COLLECTION ENTRIES
// =============================================================================

/// A text fragment selected on a page and queued for saving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTextSnippet {
    pub id: String,
    pub text: String,
    pub source_url: String,
    #[serde(default)]
    pub page_title: String,
    pub timestamp: i64,
}

impl PendingTextSnippet {
    /// Snippet with a fresh id captured now.
    pub fn new(
        text: impl Into<String>,
        source_url: impl Into<String>,
        page_title: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            source_url: source_url.into(),
            page_title: page_title.into(),
            timestamp: now_millis(),
        }
    }
}

/// Progress of a single page save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveRequestStatus {
    Pending,
    Saving,
    Success,
    Error,
}

impl SaveRequestStatus {
    /// `success` and `error` are terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, SaveRequestStatus::Success | SaveRequestStatus::Error)
    }

    fn rank(self) -> u8 {
        match self {
            SaveRequestStatus::Pending => 0,
            SaveRequestStatus::Saving => 1,
            SaveRequestStatus::Success | SaveRequestStatus::Error => 2,
        }
    }

    /// Whether moving from `self` to `next` keeps the status monotonic.
    pub fn can_advance_to(self, next: SaveRequestStatus) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }
}

/// A page URL being saved as part of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub id: String,
    pub url: String,
    pub status: SaveRequestStatus,
    pub start_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub batch_id: String,
    pub batch_timestamp: i64,
}

/// Visibility of the page overlay, shared by every tab.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayState {
    #[default]
    Expanded,
    Collapsed,
    Hidden,
}

impl OverlayState {
    /// Expanded ↔ collapsed; hidden expands.
    pub fn toggled(self) -> Self {
        match self {
            OverlayState::Expanded => OverlayState::Collapsed,
            OverlayState::Collapsed | OverlayState::Hidden => OverlayState::Expanded,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OverlayState::Expanded => "expanded",
            OverlayState::Collapsed => "collapsed",
            OverlayState::Hidden => "hidden",
        }
    }
}

impl std::fmt::Display for OverlayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// REMOTE PAYLOADS
// =============================================================================

/// Common response envelope used by most REST endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub code: u16,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

/// Result of sending page URLs to the summarization service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePageResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub note_id: Option<i64>,
}

/// One hit from the note search endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteSearchResult {
    pub id: i64,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub user_id: i64,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub remind_count: u32,
    #[serde(default)]
    pub score: Option<f64>,
}

/// A page of note search hits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub results: Vec<NoteSearchResult>,
    pub total_count: u64,
    #[serde(default)]
    pub current_page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub page_size: u32,
}

/// Token pair data returned by the auth endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: u64,
}

/// Signed-in user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: i64,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub picture: String,
    #[serde(default)]
    pub set_alarm: bool,
}
