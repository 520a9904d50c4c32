//! Document repository: the mapping between [`Document`]s and store points.
//!
//! [`DocumentRepository`] owns everything that knows about the payload
//! layout: the write path (upsert, replace, delete), the read path (get by
//! id, get by file name, filtered similarity search) and filter
//! construction. The backing [`VectorStore`] only ever sees points.
//!
//! # Payload contract
//!
//! Every point carries the keys in [`keys`]. Consumers reading the
//! collection directly rely on these names, so they must not change.
//!
//! # Search
//!
//! A [`SearchQuery`] carries either text (embedded with the repository's
//! provider) or a precomputed vector, never both. Contract violations are
//! returned as `Err(ValidationError)`; infrastructure failures (embedding,
//! store, dimensionality) come back as a `SearchResult` with
//! `success == false`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::embedding::EmbeddingProvider;
use crate::error::{DimensionMismatch, ValidationError};
use crate::models::{Document, SearchQuery, SearchResult};
use crate::store::{Condition, Filter, Payload, Point, VectorStore};

/// Payload key names stored on every point.
pub mod keys {
    pub const FILE_NAME: &str = "fileName";
    pub const CONTENT: &str = "content";
    pub const PROCESSED_AT: &str = "processedAt";
    pub const FILE_HASH: &str = "fileHash";
    pub const CHUNK_INDEX: &str = "chunkIndex";
    pub const TOTAL_CHUNKS: &str = "totalChunks";
    pub const BASE_FILE_NAME: &str = "baseFileName";
    pub const CHUNK_ID: &str = "chunkId";
}

/// Typed access to stored documents over any [`VectorStore`].
#[derive(Clone)]
pub struct DocumentRepository {
    store: Arc<dyn VectorStore>,
    dims: usize,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl DocumentRepository {
    /// `dims` is the collection's vector size.
    pub fn new(store: Arc<dyn VectorStore>, dims: usize) -> Self {
        Self {
            store,
            dims,
            embedder: None,
        }
    }

    /// Attach the provider used to embed text queries.
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Create the collection if missing. Safe to call on every start.
    pub async fn initialize(&self) -> Result<()> {
        self.store
            .ensure_collection(self.dims)
            .await
            .with_context(|| format!("initializing collection ({} dims)", self.dims))?;
        info!(dims = self.dims, "collection ready");
        Ok(())
    }

    /// Advisory existence check. Store errors are logged and read as `false`.
    pub async fn exists(&self, id: &str) -> bool {
        match self.store.point_exists(id).await {
            Ok(found) => found,
            Err(e) => {
                warn!(id, error = %e, "point existence check failed");
                false
            }
        }
    }

    pub async fn upsert(&self, document: &Document) -> Result<()> {
        self.upsert_batch(std::slice::from_ref(document)).await
    }

    /// Upsert all documents in one store round trip. Idempotent by id.
    pub async fn upsert_batch(&self, documents: &[Document]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let points = documents
            .iter()
            .map(|d| self.document_to_point(d))
            .collect::<Result<Vec<_>>>()?;
        self.store
            .upsert_points(&points)
            .await
            .with_context(|| format!("upserting {} documents", points.len()))?;
        debug!(count = points.len(), "upserted documents");
        Ok(())
    }

    /// Fetch one document, including its vector.
    pub async fn get(&self, id: &str) -> Result<Option<Document>> {
        if id.is_empty() {
            return Err(ValidationError::Empty("document id").into());
        }
        let points = self.store.get_points(&[id.to_string()], true).await?;
        points
            .into_iter()
            .next()
            .map(|p| point_to_document(p, None))
            .transpose()
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(ValidationError::Empty("document id").into());
        }
        self.store.delete_points(&[id.to_string()]).await
    }

    /// Delete every chunk stored for `file_name`; returns how many were removed.
    ///
    /// A file with no stored chunks is a no-op and issues no delete call.
    pub async fn delete_by_file_name(&self, file_name: &str) -> Result<usize> {
        let ids = self.file_point_ids(file_name).await?;
        if ids.is_empty() {
            debug!(file = file_name, "no stored chunks to delete");
            return Ok(0);
        }
        self.store
            .delete_points(&ids)
            .await
            .with_context(|| format!("deleting chunks of {}", file_name))?;
        info!(file = file_name, chunks = ids.len(), "deleted chunks");
        Ok(ids.len())
    }

    /// Store the new chunk set of a file, then remove chunks left over from
    /// its previous version. Returns the number of stale chunks removed.
    ///
    /// If the upsert fails, the previous version is left untouched.
    pub async fn replace_file_documents(
        &self,
        file_name: &str,
        documents: &[Document],
    ) -> Result<usize> {
        let previous = self.file_point_ids(file_name).await?;
        self.upsert_batch(documents).await?;

        let current: HashSet<&str> = documents.iter().map(|d| d.id.as_str()).collect();
        let stale: Vec<String> = previous
            .into_iter()
            .filter(|id| !current.contains(id.as_str()))
            .collect();
        if stale.is_empty() {
            return Ok(0);
        }
        self.store
            .delete_points(&stale)
            .await
            .with_context(|| format!("removing stale chunks of {}", file_name))?;
        debug!(file = file_name, stale = stale.len(), "removed stale chunks");
        Ok(stale.len())
    }

    /// Filtered top-k similarity search.
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResult> {
        let started = Instant::now();
        validate_query(query)?;

        let vector = match self.resolve_query_vector(query).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "search failed");
                return Ok(SearchResult::failed(format!("{:#}", e), started.elapsed()));
            }
        };

        let filter = build_filter(query);
        let filter = if filter.is_empty() {
            None
        } else {
            Some(&filter)
        };

        let hits = match self
            .store
            .search(&vector, filter, query.limit, query.minimum_score)
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "search failed");
                return Ok(SearchResult::failed(
                    format!("vector search failed: {:#}", e),
                    started.elapsed(),
                ));
            }
        };

        let documents = hits
            .into_iter()
            .map(|hit| {
                point_to_document(
                    Point {
                        id: hit.id,
                        vector: Vec::new(),
                        payload: hit.payload,
                    },
                    Some(hit.score),
                )
            })
            .collect::<Result<Vec<_>>>();

        match documents {
            Ok(documents) => {
                debug!(hits = documents.len(), "search complete");
                Ok(SearchResult::ok(documents, started.elapsed()))
            }
            Err(e) => Ok(SearchResult::failed(format!("{:#}", e), started.elapsed())),
        }
    }

    /// Every chunk of one file ordered by chunk index, without vectors.
    pub async fn get_by_file_name(&self, file_name: &str) -> Result<Vec<Document>> {
        if file_name.is_empty() {
            return Err(ValidationError::Empty("file name").into());
        }
        let points = self
            .store
            .scroll(&file_filter(file_name), false)
            .await
            .with_context(|| format!("fetching chunks of {}", file_name))?;
        let mut documents = points
            .into_iter()
            .map(|p| point_to_document(p, None))
            .collect::<Result<Vec<_>>>()?;
        documents.sort_by_key(|d| d.chunk_index);
        Ok(documents)
    }

    /// Total number of stored points.
    pub async fn count(&self) -> Result<u64> {
        self.store.count().await
    }

    async fn file_point_ids(&self, file_name: &str) -> Result<Vec<String>> {
        if file_name.is_empty() {
            return Err(ValidationError::Empty("file name").into());
        }
        let points = self
            .store
            .scroll(&file_filter(file_name), false)
            .await
            .with_context(|| format!("listing chunks of {}", file_name))?;
        Ok(points.into_iter().map(|p| p.id).collect())
    }

    async fn resolve_query_vector(&self, query: &SearchQuery) -> Result<Vec<f32>> {
        let vector = match (&query.vector, &query.text) {
            (Some(vector), _) => vector.clone(),
            (None, Some(text)) => {
                let embedder = self
                    .embedder
                    .as_ref()
                    .ok_or_else(|| anyhow!("no embedding provider configured for text queries"))?;
                embedder
                    .embed(text)
                    .await
                    .context("embedding query text")?
            }
            (None, None) => return Err(ValidationError::MissingQueryInput.into()),
        };
        if vector.len() != self.dims {
            return Err(DimensionMismatch {
                expected: self.dims,
                actual: vector.len(),
            }
            .into());
        }
        Ok(vector)
    }

    fn document_to_point(&self, document: &Document) -> Result<Point> {
        if document.id.is_empty() {
            return Err(ValidationError::Empty("document id").into());
        }
        if document.vector.len() != self.dims {
            return Err(anyhow::Error::new(DimensionMismatch {
                expected: self.dims,
                actual: document.vector.len(),
            })
            .context(format!("document {}", document.chunk_id)));
        }
        Ok(document_to_point(document))
    }
}

fn validate_query(query: &SearchQuery) -> Result<(), ValidationError> {
    if query.limit == 0 {
        return Err(ValidationError::ZeroLimit);
    }
    match (&query.text, &query.vector) {
        (Some(_), Some(_)) => Err(ValidationError::AmbiguousQueryInput),
        (None, None) => Err(ValidationError::MissingQueryInput),
        (Some(text), None) if text.trim().is_empty() => Err(ValidationError::Empty("query text")),
        (None, Some(vector)) if vector.is_empty() => Err(ValidationError::Empty("query vector")),
        _ => Ok(()),
    }
}

fn file_filter(file_name: &str) -> Filter {
    Filter::new().must(Condition::MatchAny {
        key: keys::FILE_NAME.to_string(),
        any: vec![file_name.to_string()],
    })
}

/// Build the payload filter for a query: file names OR'd together, AND'd
/// with the processed-at range.
pub fn build_filter(query: &SearchQuery) -> Filter {
    let mut filter = Filter::new();
    if !query.file_names.is_empty() {
        filter = filter.must(Condition::MatchAny {
            key: keys::FILE_NAME.to_string(),
            any: query.file_names.clone(),
        });
    }
    if query.processed_after.is_some() || query.processed_before.is_some() {
        filter = filter.must(Condition::DatetimeRange {
            key: keys::PROCESSED_AT.to_string(),
            gte: query.processed_after,
            lte: query.processed_before,
        });
    }
    filter
}

/// Render a document as a store point.
pub fn document_to_point(document: &Document) -> Point {
    let mut payload = Payload::new();
    payload.insert(keys::FILE_NAME.into(), json!(document.file_name));
    payload.insert(keys::CONTENT.into(), json!(document.content));
    payload.insert(
        keys::PROCESSED_AT.into(),
        json!(format_timestamp(&document.processed_at)),
    );
    payload.insert(keys::FILE_HASH.into(), json!(document.file_hash));
    payload.insert(keys::CHUNK_INDEX.into(), json!(document.chunk_index));
    payload.insert(keys::TOTAL_CHUNKS.into(), json!(document.total_chunks));
    payload.insert(keys::BASE_FILE_NAME.into(), json!(document.base_file_name));
    payload.insert(keys::CHUNK_ID.into(), json!(document.chunk_id));
    Point {
        id: document.id.clone(),
        vector: document.vector.clone(),
        payload,
    }
}

/// Rebuild a document from a stored point.
pub fn point_to_document(point: Point, score: Option<f32>) -> Result<Document> {
    let processed_at = DateTime::parse_from_rfc3339(str_field(&point, keys::PROCESSED_AT)?)
        .with_context(|| format!("point {}: invalid {}", point.id, keys::PROCESSED_AT))?
        .with_timezone(&Utc);
    let file_name = str_field(&point, keys::FILE_NAME)?.to_string();
    let base_file_name = str_field(&point, keys::BASE_FILE_NAME)?.to_string();
    let chunk_id = str_field(&point, keys::CHUNK_ID)?.to_string();
    let content = str_field(&point, keys::CONTENT)?.to_string();
    let file_hash = str_field(&point, keys::FILE_HASH)?.to_string();
    let chunk_index = usize_field(&point, keys::CHUNK_INDEX)?;
    let total_chunks = usize_field(&point, keys::TOTAL_CHUNKS)?;

    Ok(Document {
        id: point.id,
        file_name,
        base_file_name,
        chunk_id,
        content,
        vector: point.vector,
        file_hash,
        chunk_index,
        total_chunks,
        processed_at,
        score,
    })
}

/// RFC 3339 UTC with a `Z` suffix and full sub-second precision.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn str_field<'a>(point: &'a Point, key: &str) -> Result<&'a str> {
    point
        .payload
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("point {}: missing string payload field {}", point.id, key))
}

fn usize_field(point: &Point, key: &str) -> Result<usize> {
    point
        .payload
        .get(key)
        .and_then(Value::as_u64)
        .map(|v| v as usize)
        .ok_or_else(|| anyhow!("point {}: missing integer payload field {}", point.id, key))
}
