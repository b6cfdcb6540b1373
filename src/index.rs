//! In-memory vector index for one collection

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::record::{Metadata, MetadataFilter, Record};

/// A record returned from a similarity search with its score
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub record: Record,
    /// Cosine similarity to the query, higher is more similar
    pub score: f32,
}

/// Vectors plus metadata for one collection, searched by exact scan
///
/// At the scale this store serves (one assistant's history and a finite
/// lender catalog, thousands of records at most) a brute-force cosine scan
/// is exact and fast enough; no approximate index structure is kept. The
/// insert/search/count contract is stable if that ever changes.
#[derive(Debug, Default)]
pub struct VectorIndex {
    dimension: Option<usize>,
    records: Vec<Record>,
}

impl VectorIndex {
    /// Create an empty index; dimension is fixed by the first insert
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild an index from persisted records
    pub fn from_records(records: Vec<Record>) -> Self {
        let dimension = records.first().map(|r| r.vector.len());
        Self { dimension, records }
    }

    /// The established embedding dimension, if any record has been inserted
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Number of live (non-tombstoned) records
    pub fn count(&self) -> usize {
        self.records.iter().filter(|r| !r.deleted).count()
    }

    /// All records including tombstones, in insertion order
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Insert a record, returning its freshly assigned ID
    ///
    /// The first insert into a fresh collection establishes the dimension;
    /// later inserts must match it.
    pub fn insert(
        &mut self,
        vector: Vec<f32>,
        text: impl Into<String>,
        metadata: Metadata,
    ) -> Result<Uuid> {
        if vector.is_empty() {
            return Err(Error::invalid_input("empty embedding vector"));
        }

        match self.dimension {
            Some(expected) if expected != vector.len() => {
                return Err(Error::DimensionMismatch {
                    expected,
                    got: vector.len(),
                });
            }
            None => self.dimension = Some(vector.len()),
            _ => {}
        }

        let record = Record::new(vector, text, metadata);
        let id = record.id;
        self.records.push(record);
        Ok(id)
    }

    /// Find the k nearest live records by cosine similarity
    ///
    /// Results are sorted by descending similarity; ties keep insertion
    /// order so repeated searches are deterministic. A filter restricts
    /// which records participate; fewer than k matches returns them all.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>> {
        if self.records.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        if let Some(expected) = self.dimension {
            if query.len() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    got: query.len(),
                });
            }
        }

        let mut results: Vec<SearchResult> = self
            .records
            .iter()
            .filter(|r| !r.deleted)
            .filter(|r| filter.map(|f| f.matches(&r.metadata)).unwrap_or(true))
            .map(|r| SearchResult {
                record: r.clone(),
                score: cosine_similarity(query, &r.vector),
            })
            .collect();

        // Stable sort keeps insertion order among equal scores
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);

        Ok(results)
    }

    /// Tombstone a record so it no longer appears in searches
    ///
    /// Returns false if no live record has this ID. The record stays on disk
    /// for audit; its ID is never reused.
    pub fn delete(&mut self, id: Uuid) -> bool {
        match self.records.iter_mut().find(|r| r.id == id && !r.deleted) {
            Some(record) => {
                record.deleted = true;
                true
            }
            None => false,
        }
    }

    /// Flip the tombstone flag directly, used to undo a delete whose flush
    /// failed
    pub(crate) fn set_deleted(&mut self, id: Uuid, deleted: bool) {
        if let Some(record) = self.records.iter_mut().find(|r| r.id == id) {
            record.deleted = deleted;
        }
    }

    /// Physically remove a record, used only to roll back an insert whose
    /// flush failed so memory and disk never diverge
    pub(crate) fn evict(&mut self, id: Uuid) {
        self.records.retain(|r| r.id != id);
        if self.records.is_empty() {
            self.dimension = None;
        }
    }
}

/// Cosine similarity between two vectors
///
/// Zero-norm vectors score the cosine minimum (-1.0) instead of dividing
/// by zero, so they rank last rather than poisoning the sort with NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);

    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return -1.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{metadata_from_json, MetadataFilter};
    use serde_json::json;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let a = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
    }

    #[test]
    fn cosine_guards_zero_norm() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), -1.0);
    }

    #[test]
    fn empty_index_returns_empty_results() {
        let index = VectorIndex::new();
        assert_eq!(index.count(), 0);
        let results = index.search(&[1.0, 0.0], 3, None).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn first_insert_establishes_dimension() {
        let mut index = VectorIndex::new();
        assert_eq!(index.dimension(), None);

        index.insert(vec![1.0, 0.0], "a", Metadata::new()).unwrap();
        assert_eq!(index.dimension(), Some(2));

        let err = index
            .insert(vec![1.0, 0.0, 0.0], "b", Metadata::new())
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::DimensionMismatch { expected: 2, got: 3 }
        ));
        // failed insert leaves the index untouched
        assert_eq!(index.count(), 1);
    }

    #[test]
    fn search_ranks_by_cosine_similarity() {
        let mut index = VectorIndex::new();
        let a = index.insert(vec![1.0, 0.0], "a", Metadata::new()).unwrap();
        index.insert(vec![0.0, 1.0], "b", Metadata::new()).unwrap();
        let c = index
            .insert(vec![0.9, 0.1], "c", Metadata::new())
            .unwrap();

        let results = index.search(&[1.0, 0.0], 2, None).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].record.id, a);
        assert_eq!(results[1].record.id, c);
        assert!(results[0].score >= results[1].score);
    }

    #[test]
    fn search_never_returns_more_than_k_or_count() {
        let mut index = VectorIndex::new();
        for i in 0..4 {
            index
                .insert(vec![1.0, i as f32], "t", Metadata::new())
                .unwrap();
        }

        assert_eq!(index.search(&[1.0, 0.0], 2, None).unwrap().len(), 2);
        assert_eq!(index.search(&[1.0, 0.0], 10, None).unwrap().len(), 4);
    }

    #[test]
    fn repeated_search_is_identical() {
        let mut index = VectorIndex::new();
        // identical vectors force ties, broken by insertion order
        for text in ["first", "second", "third"] {
            index.insert(vec![1.0, 1.0], text, Metadata::new()).unwrap();
        }

        let once = index.search(&[1.0, 1.0], 3, None).unwrap();
        let twice = index.search(&[1.0, 1.0], 3, None).unwrap();

        let ids: Vec<_> = once.iter().map(|r| r.record.id).collect();
        let ids2: Vec<_> = twice.iter().map(|r| r.record.id).collect();
        assert_eq!(ids, ids2);
        assert_eq!(once[0].record.text, "first");
        assert_eq!(once[2].record.text, "third");
    }

    #[test]
    fn filter_restricts_candidates() {
        let mut index = VectorIndex::new();
        index
            .insert(
                vec![1.0, 0.0],
                "mine",
                metadata_from_json(&json!({"owner_id": "42"})),
            )
            .unwrap();
        index
            .insert(
                vec![1.0, 0.0],
                "theirs",
                metadata_from_json(&json!({"owner_id": "7"})),
            )
            .unwrap();

        let filter = MetadataFilter::new().with("owner_id", "42");
        let results = index.search(&[1.0, 0.0], 5, Some(&filter)).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.text, "mine");

        let none = MetadataFilter::new().with("owner_id", "999");
        assert!(index.search(&[1.0, 0.0], 5, Some(&none)).unwrap().is_empty());
    }

    #[test]
    fn tombstoned_records_are_excluded() {
        let mut index = VectorIndex::new();
        let id = index.insert(vec![1.0, 0.0], "gone", Metadata::new()).unwrap();
        index.insert(vec![0.5, 0.5], "kept", Metadata::new()).unwrap();

        assert!(index.delete(id));
        assert!(!index.delete(id)); // already tombstoned

        assert_eq!(index.count(), 1);
        let results = index.search(&[1.0, 0.0], 5, None).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.text, "kept");
        // the tombstone is still present in the persisted record set
        assert_eq!(index.records().len(), 2);
    }

    #[test]
    fn query_dimension_is_checked() {
        let mut index = VectorIndex::new();
        index.insert(vec![1.0, 0.0], "a", Metadata::new()).unwrap();

        let err = index.search(&[1.0, 0.0, 0.0], 1, None).unwrap_err();
        assert!(matches!(err, crate::Error::DimensionMismatch { .. }));
    }
}
