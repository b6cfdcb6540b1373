//! Domain views over the memory store for the loan counseling assistant
//!
//! The assistant keeps three collections: meaningful past conversations,
//! the lender catalog, and past loan recommendations. Each view is a thin
//! wrapper that fixes the collection name and shapes text and metadata the
//! way the conversation logic expects; all storage and retrieval goes
//! through [`MemoryStore`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::index::SearchResult;
use crate::memory::{BatchItem, BatchOutcome, MemoryStore};
use crate::record::{metadata_from_json, MetaValue, Metadata, MetadataFilter};

/// Collection of meaningful past conversations
pub const CONVERSATIONS: &str = "conversations";
/// Collection of indexed lender listings
pub const LENDERS: &str = "lenders";
/// Collection of past loan recommendations
pub const RECOMMENDATIONS: &str = "recommendations";

/// Stores conversation snippets and finds similar past interactions
pub struct ConversationLog {
    store: Arc<MemoryStore>,
}

impl ConversationLog {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    /// Store a conversation snippet tagged with the student's user ID
    ///
    /// Metadata may arrive as a JSON object or a serialized object string;
    /// values outside the scalar kinds are stringified. The user ID is
    /// always added so conversations can be filtered per student later.
    pub async fn store_conversation(
        &self,
        user_id: &str,
        conversation: &str,
        metadata: &serde_json::Value,
    ) -> Result<Uuid> {
        let mut meta = metadata_from_json(metadata);
        meta.insert("user_id".to_string(), MetaValue::from(user_id));

        self.store.remember(CONVERSATIONS, conversation, meta).await
    }

    /// Find past conversations semantically similar to the query
    pub async fn find_similar(&self, query: &str, n: usize) -> Result<Vec<SearchResult>> {
        self.store.recall(CONVERSATIONS, query, n, None).await
    }

    /// Find similar past conversations restricted to one student
    pub async fn find_similar_for_user(
        &self,
        user_id: &str,
        query: &str,
        n: usize,
    ) -> Result<Vec<SearchResult>> {
        let filter = MetadataFilter::new().with("user_id", user_id);
        self.store.recall(CONVERSATIONS, query, n, Some(&filter)).await
    }
}

/// A loan provider listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lender {
    pub name: String,
    pub about: String,
    pub interest_rate: f64,
    pub maximum_amount: i64,
    pub currency: String,
    pub country: String,
    pub key_points: Vec<String>,
}

impl Lender {
    /// The text representation that gets embedded for semantic search
    fn search_text(&self) -> String {
        format!("{} {} Interest: {}", self.name, self.about, self.interest_rate)
    }

    /// Stringified metadata so the persisted format stays uniform across
    /// lenders regardless of source typing
    fn metadata(&self) -> Metadata {
        let mut meta = Metadata::new();
        meta.insert("name".to_string(), MetaValue::from(self.name.clone()));
        meta.insert(
            "interest_rate".to_string(),
            MetaValue::from(self.interest_rate.to_string()),
        );
        meta.insert(
            "maximum_amount".to_string(),
            MetaValue::from(self.maximum_amount.to_string()),
        );
        meta.insert("currency".to_string(), MetaValue::from(self.currency.clone()));
        meta.insert("country".to_string(), MetaValue::from(self.country.clone()));
        meta.insert(
            "key_points".to_string(),
            MetaValue::from(self.key_points.join(", ")),
        );
        meta
    }
}

/// Indexes and searches the lender catalog
pub struct LenderCatalog {
    store: Arc<MemoryStore>,
}

impl LenderCatalog {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    /// Index lender listings for semantic search, best-effort per lender
    pub async fn index_lenders(&self, lenders: &[Lender]) -> Result<BatchOutcome> {
        let items = lenders
            .iter()
            .map(|lender| BatchItem::new(lender.search_text(), lender.metadata()))
            .collect();

        self.store.index_batch(LENDERS, items).await
    }

    /// Search for lenders matching a student's requirements
    pub async fn search_lenders(&self, query: &str, n: usize) -> Result<Vec<SearchResult>> {
        self.store.recall(LENDERS, query, n, None).await
    }
}

/// Stores loan recommendations keyed by the student details they answered
pub struct RecommendationLog {
    store: Arc<MemoryStore>,
}

impl RecommendationLog {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    /// Store a recommendation together with the student details it was made
    /// for, so similar students surface similar past advice
    pub async fn store_recommendation(
        &self,
        student_details: &serde_json::Value,
        recommendation: &str,
        metadata: &serde_json::Value,
    ) -> Result<Uuid> {
        let text = format!(
            "Student: {}\nRecommendation: {}",
            student_details, recommendation
        );

        self.store
            .remember(RECOMMENDATIONS, &text, metadata_from_json(metadata))
            .await
    }

    /// Find past recommendations made for similar student profiles
    pub async fn find_similar(
        &self,
        student_details: &serde_json::Value,
        n: usize,
    ) -> Result<Vec<SearchResult>> {
        self.store
            .recall(RECOMMENDATIONS, &student_details.to_string(), n, None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::embedding::testing::StubEmbedder;
    use serde_json::json;
    use tempfile::TempDir;

    fn store() -> (TempDir, Arc<MemoryStore>) {
        let dir = TempDir::new().unwrap();
        let config = Config::with_data_dir(dir.path());
        let store = MemoryStore::new(config, Arc::new(StubEmbedder::new(16))).unwrap();
        (dir, Arc::new(store))
    }

    fn sample_lenders() -> Vec<Lender> {
        vec![
            Lender {
                name: "Acme Loans".to_string(),
                about: "Fixed-rate loans for graduate students".to_string(),
                interest_rate: 4.5,
                maximum_amount: 50000,
                currency: "USD".to_string(),
                country: "US".to_string(),
                key_points: vec!["no origination fee".to_string(), "6 month grace".to_string()],
            },
            Lender {
                name: "Campus Credit".to_string(),
                about: "Flexible terms for international students".to_string(),
                interest_rate: 6.1,
                maximum_amount: 30000,
                currency: "EUR".to_string(),
                country: "DE".to_string(),
                key_points: vec!["no cosigner required".to_string()],
            },
        ]
    }

    #[tokio::test]
    async fn conversations_are_tagged_and_filterable_by_user() {
        let (_dir, store) = store();
        let log = ConversationLog::new(store.clone());

        log.store_conversation("42", "asked about loan forgiveness", &json!({"topic": "forgiveness"}))
            .await
            .unwrap();
        log.store_conversation("7", "asked about interest rates", &json!(null))
            .await
            .unwrap();

        let all = log.find_similar("asked about loan forgiveness", 5).await.unwrap();
        assert_eq!(all.len(), 2);

        let mine = log
            .find_similar_for_user("42", "asked about loan forgiveness", 5)
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(
            mine[0].record.metadata.get("user_id"),
            Some(&MetaValue::Str("42".to_string()))
        );
        assert_eq!(
            mine[0].record.metadata.get("topic"),
            Some(&MetaValue::Str("forgiveness".to_string()))
        );
    }

    #[tokio::test]
    async fn serialized_metadata_strings_are_parsed() {
        let (_dir, store) = store();
        let log = ConversationLog::new(store);

        log.store_conversation("42", "prefers low monthly payments", &json!("{\"stage\": \"repayment\"}"))
            .await
            .unwrap();

        let results = log.find_similar("prefers low monthly payments", 1).await.unwrap();
        assert_eq!(
            results[0].record.metadata.get("stage"),
            Some(&MetaValue::Str("repayment".to_string()))
        );
    }

    #[tokio::test]
    async fn lender_catalog_round_trips() {
        let (_dir, store) = store();
        let catalog = LenderCatalog::new(store.clone());

        let outcome = catalog.index_lenders(&sample_lenders()).await.unwrap();
        assert!(outcome.is_complete());
        assert_eq!(store.count(LENDERS).await, 2);

        // querying with a lender's own text representation puts it first
        let results = catalog
            .search_lenders("Acme Loans Fixed-rate loans for graduate students Interest: 4.5", 2)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(
            results[0].record.metadata.get("name"),
            Some(&MetaValue::Str("Acme Loans".to_string()))
        );
        // list-valued source data arrives joined, not dropped
        assert_eq!(
            results[0].record.metadata.get("key_points"),
            Some(&MetaValue::Str("no origination fee, 6 month grace".to_string()))
        );
    }

    #[tokio::test]
    async fn recommendations_match_similar_students() {
        let (_dir, store) = store();
        let log = RecommendationLog::new(store);

        let details = json!({"degree": "MSc", "country": "US", "amount": 20000});
        log.store_recommendation(&details, "start with federal options", &json!(null))
            .await
            .unwrap();

        let results = log.find_similar(&details, 3).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].record.text.contains("start with federal options"));
    }
}
