//! Knowledge and submission store implementations for tutorgraph.

pub mod in_memory;
pub mod snapshot;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryStore;
pub use snapshot::SnapshotStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
