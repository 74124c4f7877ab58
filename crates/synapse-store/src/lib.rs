//! # synapse-store
//!
//! Cross-context state for synapse: a shared keyed storage medium with
//! per-context handles, the typed change bus, optimistic collections,
//! the cross-tab broadcast relay, and page batch saving.

pub mod batch;
pub mod bootstrap;
pub mod change_bus;
pub mod collection;
pub mod collections;
pub mod context_store;
pub mod medium;
pub mod relay;

pub use batch::{BatchReport, SaveBatchCoordinator};
pub use bootstrap::{initialize_storage, migrate_legacy_keys};
pub use change_bus::{ChangeBus, CollectionChange};
pub use collection::{
    CollectionSpec, CollectionState, MutationOutcome, OptimisticCollection, OptimisticValue,
};
pub use collections::{
    broadcast_request_id, CollectionSet, OverlayStateCell, PageCollection, SaveRequestCollection,
    SnippetCollection,
};
pub use context_store::ContextStore;
pub use medium::StorageMedium;
pub use relay::BroadcastRelay;
