//! Centralized default constants for synapse.
//!
//! **This module is the single source of truth** for shared default values.
//! Configuration reads environment overrides and falls back to these.

// =============================================================================
// STORE KEYS
// =============================================================================

/// KeyedStore key holding the collected page URL list.
pub const KEY_COLLECTED_PAGES: &str = "collected-pages";

/// KeyedStore key holding the pending text snippet list.
pub const KEY_PENDING_SNIPPETS: &str = "pending-text-snippets";

/// KeyedStore key holding the save-request list.
pub const KEY_SAVE_REQUESTS: &str = "save-status-requests";

/// KeyedStore key holding the overlay visibility state.
pub const KEY_OVERLAY_STATE: &str = "overlay-state";

/// KeyedStore key holding the bearer access token.
pub const KEY_ACCESS_TOKEN: &str = "access_token";

/// KeyedStore key holding the refresh token.
pub const KEY_REFRESH_TOKEN: &str = "refresh_token";

/// KeyedStore key holding the signed-in user profile.
pub const KEY_USER: &str = "user";

/// KeyedStore key holding the authenticated flag.
pub const KEY_AUTHENTICATED: &str = "authenticated";

/// Prefix for degraded local-only draft copies (`draft:<id>`).
pub const DEGRADED_DRAFT_PREFIX: &str = "draft:";

/// Legacy key names migrated on startup (legacy, current).
pub const LEGACY_KEYS: &[(&str, &str)] = &[
    ("secondbrain-collected-pages", KEY_COLLECTED_PAGES),
    ("secondbrain-overlay-state", KEY_OVERLAY_STATE),
];

// =============================================================================
// DRAFT AUTOSAVE
// =============================================================================

/// Debounce delay before an edit is sent to the ephemeral cache.
pub const DEBOUNCE_MS: u64 = 500;

/// Cache persists since the last durable save that force a promotion.
pub const BATCH_CHANGE_THRESHOLD: u32 = 50;

/// Elapsed time since the last durable save that forces a promotion (5 min).
pub const BATCH_INTERVAL_SECS: u64 = 5 * 60;

/// Version assigned to a draft that has never been persisted.
pub const INITIAL_DRAFT_VERSION: u32 = 1;

// =============================================================================
// SAVE STATUS
// =============================================================================

/// Delay before a terminal save request is removed from the collection.
pub const SAVE_STATUS_REMOVAL_MS: u64 = 3_000;

// =============================================================================
// CACHING
// =============================================================================

/// Time-to-live for memoized search results (5 min).
pub const SEARCH_CACHE_TTL_SECS: u64 = 5 * 60;

/// Maximum number of memoized search keywords.
pub const SEARCH_CACHE_CAPACITY: usize = 128;

/// Page size requested from the note search endpoint.
pub const SEARCH_PAGE_SIZE: u32 = 5;

// =============================================================================
// CHANNELS
// =============================================================================

/// Capacity of the storage change broadcast channel.
pub const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the typed collection change channel.
pub const CHANGE_BUS_CAPACITY: usize = 256;

/// Capacity of the draft engine event channel.
pub const DRAFT_EVENT_CAPACITY: usize = 64;

// =============================================================================
// HTTP
// =============================================================================

/// Default REST API base URL.
pub const API_BASE_URL: &str = "http://localhost:8080";

/// Default knowledge-graph service base URL.
pub const KG_API_BASE_URL: &str = "http://localhost:8000";

/// Default HTTP request timeout (seconds).
pub const HTTP_TIMEOUT_SECS: u64 = 10;

/// Default on-disk location for the file-backed storage medium.
pub const STORE_PATH: &str = ".synapse/store.json";
