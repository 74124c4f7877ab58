//! # synapse-client
//!
//! REST clients for the backend services the sync layer talks to: the
//! ephemeral draft cache, the durable note store, page summarization,
//! note search, and session refresh.
//!
//! Mock implementations of the backend traits are available with the
//! `mock` feature.

pub mod beacon;
pub mod drafts;
pub mod http;
pub mod notes;
pub mod pages;
pub mod search;
pub mod session;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use beacon::HttpBeacon;
pub use drafts::HttpDraftCache;
pub use http::{status_error, ApiClient};
pub use notes::HttpNoteRepository;
pub use pages::HttpPageSaver;
pub use search::NoteSearchClient;
pub use session::SessionStore;
