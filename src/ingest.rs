//! Processing orchestration.
//!
//! Drives each file through hash check → extraction → chunking → embedding
//! → storage → ledger update, strictly one file (and one chunk) at a time.
//!
//! Failures are isolated per file: an unreadable PDF, an empty extraction,
//! a provider timeout or a store error marks that file as failed, records
//! the message in the run's [`ProcessingResult`] and moves on. A second file
//! with a basename already seen in the run fails the same way. Two kinds of
//! error stop the run instead:
//! - a [`ValidationError`](docvec_core::error::ValidationError), because
//!   every later file would fail the same way;
//! - cancellation, which ends the run with the partial result and
//!   `cancelled = true`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use docvec_core::chunk::Chunker;
use docvec_core::error::{is_cancelled, is_validation_error, Cancelled};
use docvec_core::models::{Document, ProcessingResult};
use docvec_core::repository::DocumentRepository;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{ChunkingConfig, Config, IngestConfig};
use crate::embedder::EmbeddingOrchestrator;
use crate::embedding::create_provider;
use crate::extract::{FileExtractor, TextExtractor};
use crate::qdrant;
use crate::tracker::{file_key, hash_file_async, FileLedger};

/// Where a file is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    New,
    HashChecked,
    Skipped,
    Extracted,
    Chunked,
    Embedded,
    Stored,
    MarkedProcessed,
    Failed,
}

/// Terminal outcome of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Processed { chunks: usize, replaced: usize },
    Skipped,
    Failed(String),
}

impl FileOutcome {
    pub fn state(&self) -> FileState {
        match self {
            FileOutcome::Processed { .. } => FileState::MarkedProcessed,
            FileOutcome::Skipped => FileState::Skipped,
            FileOutcome::Failed(_) => FileState::Failed,
        }
    }
}

pub struct Ingestor {
    repository: DocumentRepository,
    extractor: Arc<dyn TextExtractor>,
    embedder: EmbeddingOrchestrator,
    chunker: Chunker,
    ledger: FileLedger,
    force: bool,
}

impl Ingestor {
    pub fn new(
        repository: DocumentRepository,
        extractor: Arc<dyn TextExtractor>,
        embedder: EmbeddingOrchestrator,
        chunking: &ChunkingConfig,
        ledger: FileLedger,
    ) -> Result<Self> {
        let chunker = Chunker::new(chunking.chunk_size, chunking.overlap)?;
        Ok(Self {
            repository,
            extractor,
            embedder,
            chunker,
            ledger,
            force: false,
        })
    }

    /// Reprocess files even when the ledger says they are unchanged.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn ledger(&self) -> &FileLedger {
        &self.ledger
    }

    /// Process a list of files in order.
    ///
    /// Returns `Err` only for contract violations; everything else is
    /// counted in the result.
    pub async fn process_files(
        &mut self,
        paths: &[PathBuf],
        cancel: &CancellationToken,
    ) -> Result<ProcessingResult> {
        let mut result = ProcessingResult::new();
        // Stored chunks and ledger entries are keyed by basename, so only the
        // first file with a given name in a run may be ingested.
        let mut seen: HashMap<String, &Path> = HashMap::new();

        for path in paths {
            if cancel.is_cancelled() {
                result.cancelled = true;
                break;
            }
            let name = file_key(path).unwrap_or_else(|| path.display().to_string());

            if let Some(first) = seen.get(&name) {
                let message = format!(
                    "duplicate file name {} already ingested from {}",
                    name,
                    first.display()
                );
                warn!(file = %path.display(), error = %message, "file failed");
                result.record_error(&path.display().to_string(), message);
                continue;
            }
            seen.insert(name.clone(), path.as_path());

            match self.process_file(path, cancel).await {
                Ok(FileOutcome::Processed { .. }) => result.record_processed(),
                Ok(FileOutcome::Skipped) => result.record_skipped(),
                Ok(FileOutcome::Failed(message)) => result.record_error(&name, message),
                Err(e) if is_cancelled(&e) => {
                    result.cancelled = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        if result.cancelled {
            warn!(
                processed = result.processed_count,
                skipped = result.skipped_count,
                errors = result.error_count,
                "ingest cancelled"
            );
        } else {
            info!(
                processed = result.processed_count,
                skipped = result.skipped_count,
                errors = result.error_count,
                "ingest complete"
            );
        }
        Ok(result)
    }

    /// Run one file through the pipeline.
    pub async fn process_file(
        &mut self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<FileOutcome> {
        let file_name = match file_key(path) {
            Some(name) if !name.is_empty() => name,
            _ => {
                let message = format!("{} has no file name", path.display());
                warn!(path = %path.display(), "file failed: no file name");
                return Ok(FileOutcome::Failed(message));
            }
        };
        let mut state = FileState::New;

        match self.run_stages(path, &file_name, &mut state, cancel).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if is_validation_error(&e) || is_cancelled(&e) => Err(e),
            Err(e) => {
                let message = format!("{:#}", e);
                warn!(file = %file_name, stage = ?state, error = %message, "file failed");
                Ok(FileOutcome::Failed(message))
            }
        }
    }

    async fn run_stages(
        &mut self,
        path: &Path,
        file_name: &str,
        state: &mut FileState,
        cancel: &CancellationToken,
    ) -> Result<FileOutcome> {
        let digest = hash_file_async(path).await?;
        *state = FileState::HashChecked;

        if !self.force && self.ledger.is_processed(path, &digest) {
            *state = FileState::Skipped;
            debug!(file = %file_name, "unchanged, skipping");
            return Ok(FileOutcome::Skipped);
        }

        let text = self.extractor.extract(path).await?;
        *state = FileState::Extracted;
        if text.trim().is_empty() {
            bail!("no text could be extracted from {}", file_name);
        }

        let chunks = self.chunker.chunk(&text);
        *state = FileState::Chunked;
        if chunks.is_empty() {
            bail!("text of {} produced no chunks", file_name);
        }

        if cancel.is_cancelled() {
            return Err(Cancelled.into());
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_all(&texts, cancel).await?;
        *state = FileState::Embedded;

        let processed_at = Utc::now();
        let documents: Vec<Document> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                Document::from_chunk(file_name, chunk, vector, &digest, processed_at)
            })
            .collect();

        let replaced = self
            .repository
            .replace_file_documents(file_name, &documents)
            .await
            .with_context(|| format!("storing chunks of {}", file_name))?;
        *state = FileState::Stored;

        // Stored vectors stay even if the ledger cannot be written.
        if let Err(e) = self.ledger.mark_processed(path, &digest) {
            warn!(file = %file_name, error = %format!("{:#}", e), "failed to record file in ledger");
        }
        *state = FileState::MarkedProcessed;

        info!(
            file = %file_name,
            chunks = documents.len(),
            replaced,
            "processed"
        );
        Ok(FileOutcome::Processed {
            chunks: documents.len(),
            replaced,
        })
    }
}

/// Expand `path` into the files to ingest.
///
/// A file path is returned as-is. A directory is walked and filtered by
/// `include_globs` (matched case-insensitively against the path relative to
/// the directory); results are sorted for deterministic processing order.
pub fn collect_paths(path: &Path, ingest: &IngestConfig) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        bail!("Path does not exist: {}", path.display());
    }
    discover_files(path, &ingest.include_globs, ingest.follow_symlinks)
}

pub fn discover_files(
    root: &Path,
    include_globs: &[String],
    follow_symlinks: bool,
) -> Result<Vec<PathBuf>> {
    let include_set = build_globset(include_globs)?;
    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if include_set.is_match(relative) {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .with_context(|| format!("invalid include glob: {}", pattern))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// `docvec ingest`: process a file or directory and print the summary.
pub async fn run_ingest(
    config: &Config,
    path: &Path,
    force: bool,
    json: bool,
    cancel: CancellationToken,
) -> Result<ProcessingResult> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled; set [embedding] provider to ingest documents");
    }
    let provider = create_provider(&config.embedding)?;
    let repository = qdrant::open_repository(config)?;
    repository.initialize().await?;

    let paths = collect_paths(path, &config.ingest)?;
    info!(files = paths.len(), path = %path.display(), "starting ingest");

    let mut ingestor = Ingestor::new(
        repository,
        Arc::new(FileExtractor::new()),
        EmbeddingOrchestrator::from_config(provider, &config.embedding),
        &config.chunking,
        FileLedger::open(&config.ingest.ledger_path),
    )?
    .force(force);

    let result = ingestor.process_files(&paths, &cancel).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(path, &result);
    }
    Ok(result)
}

fn print_summary(path: &Path, result: &ProcessingResult) {
    println!("ingest {}", path.display());
    println!("  files: {}", result.total_files());
    println!("  processed: {}", result.processed_count);
    println!("  skipped: {}", result.skipped_count);
    println!("  errors: {}", result.error_count);
    for (file, message) in &result.errors {
        println!("    {}: {}", file, message);
    }
    if result.cancelled {
        println!("  cancelled: run stopped before all files were handled");
    }
}
