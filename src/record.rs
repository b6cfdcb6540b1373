//! Record and metadata types shared by every collection

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata attached to a record: string keys mapped to scalar values
pub type Metadata = BTreeMap<String, MetaValue>;

/// A scalar metadata value
///
/// Metadata is restricted to these four kinds so the persistence format stays
/// stable and exact-match filtering is well defined. Anything else arriving
/// at the boundary is stringified via [`MetaValue::coerce`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl MetaValue {
    /// Coerce an arbitrary JSON value into a scalar metadata value
    ///
    /// Scalars pass through typed; arrays, objects and null are stringified
    /// rather than dropped, so no key supplied by the caller is ever lost.
    pub fn coerce(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Self::Str(s.clone()),
            other => Self::Str(other.to_string()),
        }
    }
}

impl std::fmt::Display for MetaValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetaValue::Bool(b) => write!(f, "{}", b),
            MetaValue::Int(i) => write!(f, "{}", i),
            MetaValue::Float(x) => write!(f, "{}", x),
            MetaValue::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for MetaValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for MetaValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for MetaValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Build a metadata map from a loosely typed JSON value
///
/// Objects are coerced key by key. A string is first parsed as JSON in case
/// the caller passed a serialized object. Anything else yields an empty map.
pub fn metadata_from_json(value: &serde_json::Value) -> Metadata {
    match value {
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, v)| (k.clone(), MetaValue::coerce(v)))
            .collect(),
        serde_json::Value::String(s) => match serde_json::from_str(s) {
            Ok(serde_json::Value::Object(map)) => map
                .iter()
                .map(|(k, v)| (k.clone(), MetaValue::coerce(v)))
                .collect(),
            _ => Metadata::new(),
        },
        _ => Metadata::new(),
    }
}

/// One stored item: an embedding vector plus the text it came from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Unique record ID, assigned at insert and never reused
    pub id: Uuid,

    /// Embedding vector, fixed length per collection
    pub vector: Vec<f32>,

    /// Original source text (kept for display and re-embedding)
    pub text: String,

    /// Scalar metadata used for filtering
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,

    /// When the record was inserted
    pub created_at: DateTime<Utc>,

    /// Tombstone flag: excluded from search but retained on disk
    #[serde(default)]
    pub deleted: bool,
}

impl Record {
    /// Create a new live record with a fresh ID
    pub fn new(vector: Vec<f32>, text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            vector,
            text: text.into(),
            metadata,
            created_at: Utc::now(),
            deleted: false,
        }
    }
}

/// Exact-match predicate over record metadata
///
/// Every key in the filter must be present in the record's metadata with an
/// equal value for the record to participate in ranking.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataFilter(BTreeMap<String, MetaValue>);

impl MetadataFilter {
    /// Create an empty filter (matches everything)
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an exact-match condition
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Build a filter from a loosely typed JSON object, coercing values
    pub fn from_json(value: &serde_json::Value) -> Self {
        Self(metadata_from_json(value))
    }

    /// Check whether a record's metadata satisfies every condition
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.0
            .iter()
            .all(|(k, v)| metadata.get(k).map(|m| m == v).unwrap_or(false))
    }

    /// True if the filter has no conditions
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerce_keeps_scalars_typed() {
        assert_eq!(MetaValue::coerce(&json!(true)), MetaValue::Bool(true));
        assert_eq!(MetaValue::coerce(&json!(42)), MetaValue::Int(42));
        assert_eq!(MetaValue::coerce(&json!(2.5)), MetaValue::Float(2.5));
        assert_eq!(
            MetaValue::coerce(&json!("ok")),
            MetaValue::Str("ok".to_string())
        );
    }

    #[test]
    fn coerce_stringifies_everything_else() {
        let v = MetaValue::coerce(&json!(["a", "b"]));
        assert_eq!(v, MetaValue::Str("[\"a\",\"b\"]".to_string()));

        let v = MetaValue::coerce(&json!({"nested": 1}));
        assert_eq!(v, MetaValue::Str("{\"nested\":1}".to_string()));

        let v = MetaValue::coerce(&serde_json::Value::Null);
        assert_eq!(v, MetaValue::Str("null".to_string()));
    }

    #[test]
    fn metadata_from_json_parses_serialized_objects() {
        let meta = metadata_from_json(&json!({"user_id": "42", "amount": 10000}));
        assert_eq!(meta.get("user_id"), Some(&MetaValue::Str("42".into())));
        assert_eq!(meta.get("amount"), Some(&MetaValue::Int(10000)));

        let meta = metadata_from_json(&json!("{\"user_id\": \"42\"}"));
        assert_eq!(meta.get("user_id"), Some(&MetaValue::Str("42".into())));

        assert!(metadata_from_json(&json!("not json")).is_empty());
        assert!(metadata_from_json(&json!(17)).is_empty());
    }

    #[test]
    fn filter_requires_every_condition() {
        let meta = metadata_from_json(&json!({"user_id": "42", "country": "US"}));

        assert!(MetadataFilter::new().matches(&meta));
        assert!(MetadataFilter::new().with("user_id", "42").matches(&meta));
        assert!(!MetadataFilter::new().with("user_id", "43").matches(&meta));
        assert!(!MetadataFilter::new()
            .with("user_id", "42")
            .with("missing", "x")
            .matches(&meta));
    }

    #[test]
    fn record_roundtrips_through_json() {
        let meta = metadata_from_json(&json!({"user_id": "7", "score": 0.5, "active": true}));
        let record = Record::new(vec![0.1, 0.2, 0.3], "hello", meta);

        let encoded = serde_json::to_string(&record).unwrap();
        let decoded: Record = serde_json::from_str(&encoded).unwrap();

        assert_eq!(decoded.id, record.id);
        assert_eq!(decoded.vector, record.vector);
        assert_eq!(decoded.text, record.text);
        assert_eq!(decoded.metadata, record.metadata);
        assert_eq!(decoded.deleted, false);
    }
}
