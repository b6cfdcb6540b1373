//! The memory store facade consumed by the conversation logic

use std::sync::Arc;

use tokio::sync::OwnedRwLockWriteGuard;
use uuid::Uuid;

use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::index::SearchResult;
use crate::record::{Metadata, MetadataFilter};
use crate::registry::{Collection, CollectionRegistry};

/// One item of a bulk indexing request
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub text: String,
    pub metadata: Metadata,
}

impl BatchItem {
    pub fn new(text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }
}

/// An item that could not be indexed, with its position in the request
#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub index: usize,
    pub reason: String,
}

/// Outcome of a best-effort bulk indexing call
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub inserted: Vec<Uuid>,
    pub failed: Vec<BatchFailure>,
}

impl BatchOutcome {
    /// True if every item was indexed
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Public entry point over the collections: embed, store, retrieve
///
/// Constructed explicitly with its persistence location and embedding
/// provider and handed to whatever owns the conversation session; there is
/// no ambient global store. Embedding always happens before a collection
/// lock is taken, so a slow provider never stalls readers.
pub struct MemoryStore {
    config: Config,
    registry: CollectionRegistry,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl MemoryStore {
    /// Create a new memory store, loading any persisted collections
    pub fn new(config: Config, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        config.ensure_dirs()?;
        let registry = CollectionRegistry::open(&config)?;

        Ok(Self {
            config,
            registry,
            embedder,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Embed with the configured timeout; slow or failing providers surface
    /// as `EmbeddingUnavailable` with nothing persisted
    async fn embed_guarded(&self, text: &str) -> Result<Vec<f32>> {
        match tokio::time::timeout(self.config.embed_timeout, self.embedder.embed(text)).await {
            Ok(result) => result,
            Err(_) => Err(Error::embedding_unavailable(format!(
                "embedding call exceeded {:?}",
                self.config.embed_timeout
            ))),
        }
    }

    /// Write-lock a collection for mutation, creating it on first use
    ///
    /// A concurrent drop can destroy the collection between the lookup and
    /// the lock acquisition; a guard over a dropped collection is discarded
    /// and the lookup repeated, so writes never land in a destroyed
    /// collection or resurrect its snapshot.
    async fn write_live(&self, collection: &str) -> Result<OwnedRwLockWriteGuard<Collection>> {
        loop {
            let handle = self
                .registry
                .get_or_create(collection, Some(self.embedder.dimensions()))
                .await?;
            let guard = handle.write_owned().await;
            if !guard.is_dropped() {
                return Ok(guard);
            }
        }
    }

    /// Embed text and store it in a collection, creating the collection on
    /// first use; returns the new record's ID
    pub async fn remember(
        &self,
        collection: &str,
        text: &str,
        metadata: Metadata,
    ) -> Result<Uuid> {
        let vector = self.embed_guarded(text).await?;

        let mut guard = self.write_live(collection).await?;

        let id = guard.index_mut().insert(vector, text, metadata)?;

        if let Err(e) = self.flush_locked(&guard) {
            // roll back so memory and disk never diverge
            guard.index_mut().evict(id);
            return Err(e);
        }

        tracing::info!(collection, %id, "stored record");
        Ok(id)
    }

    /// Embed a query and return the k most similar records
    ///
    /// A collection that does not exist yet has nothing to recall and
    /// returns an empty result rather than an error.
    pub async fn recall(
        &self,
        collection: &str,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>> {
        let handle = match self.registry.get(collection).await {
            Some(handle) => handle,
            None => return Ok(Vec::new()),
        };

        let query_vector = self.embed_guarded(query).await?;

        let guard = handle.read().await;
        if guard.is_dropped() {
            return Ok(Vec::new());
        }
        guard.index().search(&query_vector, k, filter)
    }

    /// Bulk variant of remember for catalog-style data
    ///
    /// Best-effort: items whose embedding or insert fails are reported with
    /// their position instead of aborting the batch. The collection is
    /// flushed once after the batch.
    pub async fn index_batch(
        &self,
        collection: &str,
        items: Vec<BatchItem>,
    ) -> Result<BatchOutcome> {
        if items.is_empty() {
            return Ok(BatchOutcome::default());
        }

        // embed everything before taking the collection lock
        let embeddings =
            futures::future::join_all(items.iter().map(|item| self.embed_guarded(&item.text)))
                .await;

        let mut guard = self.write_live(collection).await?;

        let mut outcome = BatchOutcome::default();
        for (index, (item, embedding)) in items.into_iter().zip(embeddings).enumerate() {
            match embedding {
                Ok(vector) => {
                    match guard.index_mut().insert(vector, item.text, item.metadata) {
                        Ok(id) => outcome.inserted.push(id),
                        Err(e) => outcome.failed.push(BatchFailure {
                            index,
                            reason: e.to_string(),
                        }),
                    }
                }
                Err(e) => outcome.failed.push(BatchFailure {
                    index,
                    reason: e.to_string(),
                }),
            }
        }

        if !outcome.inserted.is_empty() {
            if let Err(e) = self.flush_locked(&guard) {
                for id in &outcome.inserted {
                    guard.index_mut().evict(*id);
                }
                return Err(e);
            }
        }

        if !outcome.failed.is_empty() {
            tracing::warn!(
                collection,
                inserted = outcome.inserted.len(),
                failed = outcome.failed.len(),
                "batch indexed with failures"
            );
        }

        Ok(outcome)
    }

    /// Number of live records in a collection, zero if it does not exist
    pub async fn count(&self, collection: &str) -> usize {
        match self.registry.get(collection).await {
            Some(handle) => handle.read().await.index().count(),
            None => 0,
        }
    }

    /// Tombstone a record; returns false if the collection or record is unknown
    pub async fn forget(&self, collection: &str, id: Uuid) -> Result<bool> {
        let handle = match self.registry.get(collection).await {
            Some(handle) => handle,
            None => return Ok(false),
        };
        let mut guard = handle.write().await;
        if guard.is_dropped() {
            return Ok(false);
        }

        if !guard.index_mut().delete(id) {
            return Ok(false);
        }

        if let Err(e) = self.flush_locked(&guard) {
            guard.index_mut().set_deleted(id, false);
            return Err(e);
        }

        Ok(true)
    }

    /// Names of every known collection
    pub async fn list_collections(&self) -> Vec<String> {
        self.registry.list_collections().await
    }

    /// Destroy a collection and its persisted snapshot (administrative)
    pub async fn drop_collection(&self, collection: &str) -> Result<()> {
        self.registry.drop_collection(collection).await
    }

    fn flush_locked(&self, guard: &Collection) -> Result<()> {
        self.registry.snapshots().flush(
            guard.name(),
            guard.index().dimension(),
            guard.index().records(),
        )
    }
}
