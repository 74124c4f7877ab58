//! # synapse-core
//!
//! Core types, traits, and abstractions for the synapse note-capture client.
//!
//! This crate provides the foundational data structures and trait definitions
//! that the other synapse crates depend on:
//!
//! - Draft, note, snippet, and save-request models
//! - The [`KeyedStore`] contract shared by every execution context
//! - Interfaces for the external collaborators (draft cache, note store,
//!   page saver, unload beacon, degraded local draft store)
//! - The crate-wide [`Error`] type and error taxonomy
//! - A bounded TTL [`Cache`] for short-lived query results
//! - Centralized defaults, environment configuration, and logging setup

pub mod cache;
pub mod config;
pub mod defaults;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use cache::Cache;
pub use config::SyncConfig;
pub use error::{Error, Result};
pub use events::{ChangeReceiver, ContextId, RelayMessage, StorageChange};
pub use models::*;
pub use traits::*;
pub use uuid_utils::{new_batch_id, new_draft_id, new_v7};
