//! Core data models used throughout docvec.
//!
//! These types represent the chunks, stored documents, search queries and
//! per-run summaries that flow through the ingestion and retrieval pipeline.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A passage produced by the chunker, before embedding.
///
/// Invariant: `index < of_total`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChunk {
    pub text: String,
    pub index: usize,
    pub of_total: usize,
}

/// The persistent unit of storage: one embedded chunk of one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Point identifier (UUID string). Immutable once stored.
    pub id: String,
    /// Original source file name (basename).
    pub file_name: String,
    /// `file_name` without its extension.
    pub base_file_name: String,
    /// Stable composite key `"{base_file_name}_{chunk_index}"`.
    pub chunk_id: String,
    /// The chunk's text.
    pub content: String,
    /// Embedding vector. Empty when the read path did not request vectors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vector: Vec<f32>,
    /// Content hash of the whole source file at processing time.
    pub file_hash: String,
    /// 0-based position of this chunk in its file.
    pub chunk_index: usize,
    /// Number of chunks the file was split into.
    pub total_chunks: usize,
    /// Processing timestamp (UTC).
    pub processed_at: DateTime<Utc>,
    /// Similarity score. Populated on search results only, never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl Document {
    /// Build the document for one chunk of a file, with a fresh UUID.
    pub fn from_chunk(
        file_name: &str,
        chunk: &DocumentChunk,
        vector: Vec<f32>,
        file_hash: &str,
        processed_at: DateTime<Utc>,
    ) -> Self {
        let base = base_file_name(file_name);
        Self {
            id: Uuid::new_v4().to_string(),
            file_name: file_name.to_string(),
            chunk_id: chunk_key(&base, chunk.index),
            base_file_name: base,
            content: chunk.text.clone(),
            vector,
            file_hash: file_hash.to_string(),
            chunk_index: chunk.index,
            total_chunks: chunk.of_total,
            processed_at,
            score: None,
        }
    }
}

/// Strip the extension from a file name: `"report.v2.pdf"` → `"report.v2"`.
pub fn base_file_name(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string())
}

/// Composite chunk key `"{base}_{index}"`.
pub fn chunk_key(base_file_name: &str, chunk_index: usize) -> String {
    format!("{}_{}", base_file_name, chunk_index)
}

/// Summary of one processing run.
///
/// Created at the start of a run, updated as each file is handled, reported
/// at the end. Invariant: `total_files() == processed_count + skipped_count + error_count`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessingResult {
    pub processed_count: usize,
    pub skipped_count: usize,
    pub error_count: usize,
    /// File name → error message for every failed file.
    pub errors: BTreeMap<String, String>,
    /// Set when the run stopped early because it was cancelled.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
}

impl ProcessingResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_processed(&mut self) {
        self.processed_count += 1;
    }

    pub fn record_skipped(&mut self) {
        self.skipped_count += 1;
    }

    pub fn record_error(&mut self, file_name: &str, message: impl Into<String>) {
        self.error_count += 1;
        self.errors.insert(file_name.to_string(), message.into());
    }

    pub fn total_files(&self) -> usize {
        self.processed_count + self.skipped_count + self.error_count
    }
}

/// A similarity search request.
///
/// Exactly one of `text` and `vector` must be set: text is embedded by the
/// repository's embedding provider, a vector is used as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: Option<String>,
    pub vector: Option<Vec<f32>>,
    /// Allow-list of file names (OR'd together). Empty means no restriction.
    pub file_names: Vec<String>,
    pub processed_after: Option<DateTime<Utc>>,
    pub processed_before: Option<DateTime<Utc>>,
    pub limit: usize,
    pub minimum_score: Option<f32>,
}

impl SearchQuery {
    pub const DEFAULT_LIMIT: usize = 5;

    /// A free-text query.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::empty()
        }
    }

    /// A query with a precomputed vector.
    pub fn vector(vector: Vec<f32>) -> Self {
        Self {
            vector: Some(vector),
            ..Self::empty()
        }
    }

    fn empty() -> Self {
        Self {
            text: None,
            vector: None,
            file_names: Vec::new(),
            processed_after: None,
            processed_before: None,
            limit: Self::DEFAULT_LIMIT,
            minimum_score: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_names.push(file_name.into());
        self
    }

    pub fn processed_after(mut self, ts: DateTime<Utc>) -> Self {
        self.processed_after = Some(ts);
        self
    }

    pub fn processed_before(mut self, ts: DateTime<Utc>) -> Self {
        self.processed_before = Some(ts);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn minimum_score(mut self, score: f32) -> Self {
        self.minimum_score = Some(score);
        self
    }
}

/// Outcome of a search. Failures are reported in-band rather than as `Err`.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    /// Matches ordered by descending score.
    pub documents: Vec<Document>,
    pub total_count: usize,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl SearchResult {
    pub fn ok(documents: Vec<Document>, elapsed: Duration) -> Self {
        Self {
            total_count: documents.len(),
            documents,
            elapsed,
            success: true,
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            documents: Vec::new(),
            total_count: 0,
            elapsed,
            success: false,
            error_message: Some(message.into()),
        }
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}
