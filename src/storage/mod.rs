//! Storage backends for counsel-memory

mod snapshot;

pub use snapshot::{CollectionSnapshot, SnapshotStore};
