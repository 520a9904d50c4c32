//! Plain-text extraction from source files.
//!
//! The ingest pipeline only needs `extract(path) -> String`. PDFs go
//! through `pdf-extract` on a blocking thread; `.txt` and `.md` files are
//! read as UTF-8. Any other extension is rejected. Extraction never panics:
//! unreadable or corrupt files return an [`ExtractError`] and the pipeline
//! fails that one file.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Converts a source document into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Best-effort plain text. May be empty; the caller decides what that means.
    async fn extract(&self, path: &Path) -> Result<String>;
}

/// Extension-dispatching extractor for PDF, plain text and Markdown.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileExtractor;

impl FileExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextExtractor for FileExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => {
                let bytes = read_bytes(path).await?;
                // pdf-extract is CPU-bound and may panic on malformed input.
                let text = tokio::task::spawn_blocking(move || extract_pdf(&bytes)).await??;
                Ok(text)
            }
            "txt" | "md" | "markdown" => {
                let bytes = read_bytes(path).await?;
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
            other => Err(ExtractError::UnsupportedType(if other.is_empty() {
                path.display().to_string()
            } else {
                format!(".{}", other)
            })
            .into()),
        }
    }
}

async fn read_bytes(path: &Path) -> Result<Vec<u8>, ExtractError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| ExtractError::Io {
            path: path.display().to_string(),
            source,
        })
}

/// Extract text from in-memory PDF bytes.
pub fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}
