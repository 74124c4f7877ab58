//! # synapse-draft
//!
//! Autosave for in-progress notes across three durability tiers:
//!
//! - debounced writes to the remote ephemeral draft cache,
//! - batched promotion to the durable note store,
//! - a fire-and-forget flush at teardown.
//!
//! A degraded local copy keeps edits that the cache rejected.

pub mod debounce;
pub mod degraded;
pub mod engine;
pub mod policy;
pub mod snapshot;

pub use debounce::Debouncer;
pub use degraded::KeyedDegradedStore;
pub use engine::{
    DraftAutosaveEngine, DraftBackends, DraftConfig, DraftEngineBuilder, PromotionCallback,
};
pub use policy::{is_cacheable, is_promotable, BatchPolicy};
pub use snapshot::{
    CloseOutcome, DraftEvent, DraftPayload, DraftPhase, DraftSnapshot, PromotionOutcome,
};
