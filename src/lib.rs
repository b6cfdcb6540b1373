//! # Counsel Memory
//!
//! A persistent, multi-collection semantic memory store for a loan
//! counseling assistant.
//!
//! ## Architecture
//!
//! - **EmbeddingProvider** - opaque, fallible text-to-vector boundary
//! - **VectorIndex** - per-collection exact cosine search with metadata filters
//! - **CollectionRegistry** - named collections with get-or-create semantics
//! - **SnapshotStore** - one atomic snapshot file per collection
//! - **MemoryStore** - the facade the conversation logic talks to
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use counsel_memory::{Config, LocalEmbedder, MemoryStore, MetadataFilter};
//!
//! let config = Config::default();
//! let embedder = Arc::new(LocalEmbedder::new(&config)?);
//! let store = MemoryStore::new(config, embedder)?;
//!
//! // Store a conversation snippet
//! let id = store.remember("conversations", "asked about refinancing", meta).await?;
//!
//! // Retrieve the closest past conversations for a query
//! let filter = MetadataFilter::new().with("user_id", "42");
//! let matches = store.recall("conversations", "refinancing options", 3, Some(&filter)).await?;
//! ```

pub mod config;
pub mod counselor;
pub mod embedding;
pub mod error;
pub mod index;
pub mod memory;
pub mod record;
pub mod registry;
pub mod storage;

pub use config::Config;
pub use counselor::{ConversationLog, Lender, LenderCatalog, RecommendationLog};
pub use embedding::{EmbeddingProvider, LocalEmbedder};
pub use error::{Error, Result};
pub use index::{SearchResult, VectorIndex};
pub use memory::{BatchFailure, BatchItem, BatchOutcome, MemoryStore};
pub use record::{MetaValue, Metadata, MetadataFilter, Record};
pub use registry::CollectionRegistry;
