//! Counsel Memory Server
//!
//! HTTP API over the memory store facade.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use counsel_memory::{
    config::Config,
    embedding::LocalEmbedder,
    error::Error,
    index::SearchResult,
    memory::{BatchItem, MemoryStore},
    record::{metadata_from_json, Metadata, MetadataFilter},
};

/// The store is internally synchronized per collection, so handlers share it
/// directly
type SharedStore = Arc<MemoryStore>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::default();
    tracing::info!("Starting Counsel Memory Server on port {}", config.server_port);
    tracing::info!("Data directory: {:?}", config.data_dir);

    // Initialize components
    let embedder = Arc::new(LocalEmbedder::new(&config)?);
    let store = Arc::new(MemoryStore::new(config.clone(), embedder)?);

    // Build router
    let app = Router::new()
        // Health check
        .route("/health", get(health))
        // Collections
        .route("/collections", get(list_collections))
        .route("/collections/:name", delete(drop_collection))
        .route("/collections/:name/count", get(count))
        // Store and retrieve
        .route("/collections/:name/remember", post(remember))
        .route("/collections/:name/recall", post(recall))
        .route("/collections/:name/index", post(index_batch))
        .route("/collections/:name/records/:id", delete(forget))
        // Add CORS
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(store.clone());

    let port = store.config().server_port;
    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("Server listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::DimensionMismatch { .. } | Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::EmbeddingUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::CollectionNotFound(_) => StatusCode::NOT_FOUND,
        Error::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// === Handlers ===

async fn health() -> &'static str {
    "ok"
}

async fn list_collections(State(store): State<SharedStore>) -> Json<Vec<String>> {
    Json(store.list_collections().await)
}

#[derive(Debug, Serialize)]
struct CountResponse {
    collection: String,
    count: usize,
}

async fn count(
    State(store): State<SharedStore>,
    Path(name): Path<String>,
) -> Json<CountResponse> {
    let count = store.count(&name).await;
    Json(CountResponse {
        collection: name,
        count,
    })
}

#[derive(Debug, Deserialize)]
struct RememberRequest {
    text: String,
    #[serde(default)]
    metadata: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct RememberResponse {
    id: String,
}

async fn remember(
    State(store): State<SharedStore>,
    Path(name): Path<String>,
    Json(req): Json<RememberRequest>,
) -> Result<Json<RememberResponse>, StatusCode> {
    let id = store
        .remember(&name, &req.text, metadata_from_json(&req.metadata))
        .await
        .map_err(|e| status_for(&e))?;

    Ok(Json(RememberResponse { id: id.to_string() }))
}

#[derive(Debug, Deserialize)]
struct RecallRequest {
    query: String,
    k: Option<usize>,
    filter: Option<serde_json::Value>,
}

async fn recall(
    State(store): State<SharedStore>,
    Path(name): Path<String>,
    Json(req): Json<RecallRequest>,
) -> Result<Json<Vec<MatchResponse>>, StatusCode> {
    let k = req.k.unwrap_or(store.config().default_k);
    let filter = req.filter.as_ref().map(MetadataFilter::from_json);

    let results = store
        .recall(&name, &req.query, k, filter.as_ref())
        .await
        .map_err(|e| status_for(&e))?;

    Ok(Json(results.into_iter().map(MatchResponse::from).collect()))
}

#[derive(Debug, Deserialize)]
struct IndexItemRequest {
    text: String,
    #[serde(default)]
    metadata: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct IndexRequest {
    items: Vec<IndexItemRequest>,
}

#[derive(Debug, Serialize)]
struct IndexResponse {
    inserted: Vec<String>,
    failed: Vec<IndexFailureResponse>,
}

#[derive(Debug, Serialize)]
struct IndexFailureResponse {
    index: usize,
    reason: String,
}

async fn index_batch(
    State(store): State<SharedStore>,
    Path(name): Path<String>,
    Json(req): Json<IndexRequest>,
) -> Result<Json<IndexResponse>, StatusCode> {
    let items: Vec<BatchItem> = req
        .items
        .into_iter()
        .map(|item| BatchItem::new(item.text, metadata_from_json(&item.metadata)))
        .collect();

    let outcome = store
        .index_batch(&name, items)
        .await
        .map_err(|e| status_for(&e))?;

    Ok(Json(IndexResponse {
        inserted: outcome.inserted.iter().map(Uuid::to_string).collect(),
        failed: outcome
            .failed
            .into_iter()
            .map(|f| IndexFailureResponse {
                index: f.index,
                reason: f.reason,
            })
            .collect(),
    }))
}

async fn forget(
    State(store): State<SharedStore>,
    Path((name, id)): Path<(String, String)>,
) -> Result<StatusCode, StatusCode> {
    let id = Uuid::parse_str(&id).map_err(|_| StatusCode::BAD_REQUEST)?;

    let found = store
        .forget(&name, id)
        .await
        .map_err(|e| status_for(&e))?;

    if found {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

async fn drop_collection(
    State(store): State<SharedStore>,
    Path(name): Path<String>,
) -> Result<StatusCode, StatusCode> {
    store
        .drop_collection(&name)
        .await
        .map_err(|e| status_for(&e))?;

    Ok(StatusCode::NO_CONTENT)
}

// === Response types ===

#[derive(Debug, Serialize)]
struct MatchResponse {
    id: String,
    text: String,
    metadata: Metadata,
    score: f32,
    created_at: String,
}

impl From<SearchResult> for MatchResponse {
    fn from(result: SearchResult) -> Self {
        Self {
            id: result.record.id.to_string(),
            text: result.record.text,
            metadata: result.record.metadata,
            score: result.score,
            created_at: result.record.created_at.to_rfc3339(),
        }
    }
}
