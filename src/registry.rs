//! Named collections and their get-or-create lifecycle

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::index::VectorIndex;
use crate::storage::SnapshotStore;

/// One named collection: its index plus the name it persists under
pub struct Collection {
    name: String,
    index: VectorIndex,
    dropped: bool,
}

impl Collection {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn index_mut(&mut self) -> &mut VectorIndex {
        &mut self.index
    }

    /// True once the collection has been destroyed
    ///
    /// A caller that obtained this handle before the drop must not mutate
    /// or flush it; doing so would resurrect the collection on disk.
    pub fn is_dropped(&self) -> bool {
        self.dropped
    }
}

/// Shared handle to a collection; readers proceed in parallel, writers
/// serialize against readers of the same collection only
pub type SharedCollection = Arc<RwLock<Collection>>;

/// Owns the set of named collections and their persistence
///
/// Collections are loaded eagerly from persisted snapshots at startup and
/// created lazily on first use for names not yet seen. They are destroyed
/// only by [`CollectionRegistry::drop_collection`].
pub struct CollectionRegistry {
    snapshots: SnapshotStore,
    collections: RwLock<HashMap<String, SharedCollection>>,
}

impl CollectionRegistry {
    /// Open the registry, loading every persisted collection
    pub fn open(config: &Config) -> Result<Self> {
        let snapshots = SnapshotStore::new(config)?;

        let mut collections = HashMap::new();
        for snapshot in snapshots.load_all()? {
            tracing::info!(
                collection = %snapshot.name,
                records = snapshot.records.len(),
                "loaded persisted collection"
            );
            collections.insert(
                snapshot.name.clone(),
                Arc::new(RwLock::new(Collection {
                    name: snapshot.name,
                    index: VectorIndex::from_records(snapshot.records),
                    dropped: false,
                })),
            );
        }

        Ok(Self {
            snapshots,
            collections: RwLock::new(collections),
        })
    }

    /// Get a collection if it exists
    pub async fn get(&self, name: &str) -> Option<SharedCollection> {
        self.collections.read().await.get(name).cloned()
    }

    /// Get a collection, creating an empty one if the name is new
    ///
    /// An existing collection's established dimension always governs; a
    /// mismatched hint is a configuration warning, not an error, unless an
    /// insert later violates it.
    pub async fn get_or_create(
        &self,
        name: &str,
        dimension_hint: Option<usize>,
    ) -> Result<SharedCollection> {
        validate_name(name)?;

        if let Some(collection) = self.get(name).await {
            if let (Some(hint), Some(established)) =
                (dimension_hint, collection.read().await.index.dimension())
            {
                if hint != established {
                    tracing::warn!(
                        collection = name,
                        hint,
                        established,
                        "dimension hint disagrees with established dimension"
                    );
                }
            }
            return Ok(collection);
        }

        let mut collections = self.collections.write().await;
        // another writer may have created it while we waited for the lock
        let collection = collections
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::info!(collection = name, "created collection");
                Arc::new(RwLock::new(Collection {
                    name: name.to_string(),
                    index: VectorIndex::new(),
                    dropped: false,
                }))
            })
            .clone();

        Ok(collection)
    }

    /// Names of every known collection, sorted
    pub async fn list_collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Destroy a collection and its persisted snapshot
    ///
    /// The only destructive administrative operation; fails with
    /// [`Error::CollectionNotFound`] for an unknown name.
    pub async fn drop_collection(&self, name: &str) -> Result<()> {
        let removed = self.collections.write().await.remove(name);

        // Taking the write lock waits out in-flight writers, and the flag
        // stops any later writer still holding this handle from flushing
        // the collection back onto disk after the snapshot is removed.
        if let Some(collection) = &removed {
            collection.write().await.dropped = true;
        }

        // a collection created but never flushed has no snapshot file yet
        let file_removed = match self.snapshots.remove(name) {
            Ok(()) => true,
            Err(Error::CollectionNotFound(_)) => false,
            Err(e) => return Err(e),
        };

        if removed.is_none() && !file_removed {
            return Err(Error::collection_not_found(name));
        }

        tracing::info!(collection = name, "dropped collection");
        Ok(())
    }

    /// The snapshot store collections flush through
    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }
}

/// Collection names become file names, so keep them to a safe alphabet
pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_input("collection name is empty"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::invalid_input(format!(
            "collection name {:?} contains characters outside [a-zA-Z0-9_-]",
            name
        )));
    }
    Ok(())
}
