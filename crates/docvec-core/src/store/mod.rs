//! Point-level vector store abstraction.
//!
//! The [`VectorStore`] trait is the seam between the document repository
//! and a concrete vector index. It speaks in *points* (id, vector, JSON
//! payload) and knows nothing about documents or chunks; mapping between
//! the two lives in [`crate::repository`].
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//! [`memory::InMemoryStore`] is provided here; the Qdrant REST backend
//! lives in the `docvec` app crate.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Non-vector metadata attached to a point.
pub type Payload = serde_json::Map<String, Value>;

/// A stored point. `vector` is empty when it was not requested on read.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

/// A point returned by similarity search, without its vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: Payload,
}

/// Conjunction of payload conditions. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub must: Vec<Condition>,
}

/// A single payload condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// The string value at `key` equals any of `any`.
    MatchAny { key: String, any: Vec<String> },
    /// The RFC 3339 timestamp at `key` lies within the inclusive bounds.
    DatetimeRange {
        key: String,
        gte: Option<DateTime<Utc>>,
        lte: Option<DateTime<Utc>>,
    },
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
    }

    pub fn must(mut self, condition: Condition) -> Self {
        self.must.push(condition);
        self
    }

    /// Evaluate the filter against a payload.
    pub fn matches(&self, payload: &Payload) -> bool {
        self.must.iter().all(|c| c.matches(payload))
    }
}

impl Condition {
    pub fn matches(&self, payload: &Payload) -> bool {
        match self {
            Condition::MatchAny { key, any } => match payload.get(key).and_then(Value::as_str) {
                Some(value) => any.iter().any(|candidate| candidate == value),
                None => false,
            },
            Condition::DatetimeRange { key, gte, lte } => {
                let ts = match payload
                    .get(key)
                    .and_then(Value::as_str)
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                {
                    Some(ts) => ts.with_timezone(&Utc),
                    None => return false,
                };
                gte.map_or(true, |lower| ts >= lower) && lte.map_or(true, |upper| ts <= upper)
            }
        }
    }
}

/// Abstract point store backing a single collection.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ensure_collection`](VectorStore::ensure_collection) | Create the collection if missing, verify dimensionality |
/// | [`point_exists`](VectorStore::point_exists) | Existence check by id |
/// | [`upsert_points`](VectorStore::upsert_points) | Insert or overwrite points by id, one round trip |
/// | [`get_points`](VectorStore::get_points) | Retrieve points by id |
/// | [`delete_points`](VectorStore::delete_points) | Delete points by id |
/// | [`scroll`](VectorStore::scroll) | Fetch every point matching a filter |
/// | [`search`](VectorStore::search) | Top-k cosine similarity search |
/// | [`count`](VectorStore::count) | Total number of points |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection with cosine distance if it does not exist.
    ///
    /// Fails if the collection exists with a different vector size.
    async fn ensure_collection(&self, dims: usize) -> Result<()>;

    async fn point_exists(&self, id: &str) -> Result<bool>;

    async fn upsert_points(&self, points: &[Point]) -> Result<()>;

    /// Retrieve points by id. Unknown ids are silently absent from the result.
    async fn get_points(&self, ids: &[String], with_vector: bool) -> Result<Vec<Point>>;

    async fn delete_points(&self, ids: &[String]) -> Result<()>;

    /// Fetch all points matching `filter`, across as many pages as needed.
    async fn scroll(&self, filter: &Filter, with_vector: bool) -> Result<Vec<Point>>;

    /// Return at most `limit` points ordered by descending score. Points
    /// scoring below `score_threshold` are excluded.
    async fn search(
        &self,
        vector: &[f32],
        filter: Option<&Filter>,
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredPoint>>;

    async fn count(&self) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn payload(file: &str, ts: &str) -> Payload {
        match json!({ "fileName": file, "processedAt": ts }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_empty_filter_matches_all() {
        assert!(Filter::new().matches(&payload("a.pdf", "2024-01-01T00:00:00Z")));
        assert!(Filter::new().matches(&Payload::new()));
    }

    #[test]
    fn test_match_any() {
        let f = Filter::new().must(Condition::MatchAny {
            key: "fileName".into(),
            any: vec!["a.pdf".into(), "b.pdf".into()],
        });
        assert!(f.matches(&payload("a.pdf", "2024-01-01T00:00:00Z")));
        assert!(f.matches(&payload("b.pdf", "2024-01-01T00:00:00Z")));
        assert!(!f.matches(&payload("c.pdf", "2024-01-01T00:00:00Z")));
        assert!(!f.matches(&Payload::new()));
    }

    #[test]
    fn test_datetime_range_inclusive() {
        let lower = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let upper = Utc.with_ymd_and_hms(2024, 3, 31, 23, 59, 59).unwrap();
        let f = Filter::new().must(Condition::DatetimeRange {
            key: "processedAt".into(),
            gte: Some(lower),
            lte: Some(upper),
        });
        assert!(f.matches(&payload("a.pdf", "2024-03-01T00:00:00Z")));
        assert!(f.matches(&payload("a.pdf", "2024-03-15T12:00:00+02:00")));
        assert!(f.matches(&payload("a.pdf", "2024-03-31T23:59:59Z")));
        assert!(!f.matches(&payload("a.pdf", "2024-04-01T00:00:00Z")));
        assert!(!f.matches(&payload("a.pdf", "not a date")));
    }

    #[test]
    fn test_conditions_are_anded() {
        let f = Filter::new()
            .must(Condition::MatchAny {
                key: "fileName".into(),
                any: vec!["a.pdf".into()],
            })
            .must(Condition::DatetimeRange {
                key: "processedAt".into(),
                gte: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
                lte: None,
            });
        assert!(f.matches(&payload("a.pdf", "2024-06-01T00:00:00Z")));
        assert!(!f.matches(&payload("a.pdf", "2023-06-01T00:00:00Z")));
        assert!(!f.matches(&payload("b.pdf", "2024-06-01T00:00:00Z")));
    }
}
