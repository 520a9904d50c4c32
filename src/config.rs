//! TOML configuration.
//!
//! Loaded once at startup from `--config` (default `./config/docvec.toml`)
//! and validated by [`load_config`]. Every section except `[qdrant]` may be
//! omitted; missing fields take the defaults below.
//!
//! API keys are never stored in the file: the OpenAI providers read
//! `OPENAI_API_KEY` / `AZURE_OPENAI_API_KEY` from the environment.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub qdrant: QdrantConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QdrantConfig {
    #[serde(default = "default_qdrant_url")]
    pub url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_qdrant_url() -> String {
    "http://localhost:6333".to_string()
}
fn default_collection() -> String {
    "documents".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL (OpenAI, Ollama) or resource endpoint (Azure).
    #[serde(default)]
    pub url: Option<String>,
    /// Azure deployment name.
    #[serde(default)]
    pub deployment: Option<String>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Pause between consecutive embedding calls.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            deployment: None,
            api_version: default_api_version(),
            timeout_secs: default_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_api_version() -> String {
    "2024-02-01".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_request_delay_ms() -> u64 {
    100
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Target chunk size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters carried from the end of one chunk into the next.
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_overlap() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// JSON file mapping file name to the hash it was last processed with.
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            ledger_path: default_ledger_path(),
            include_globs: default_include_globs(),
            follow_symlinks: false,
        }
    }
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("./data/processed_files.json")
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*.pdf".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub min_score: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            min_score: None,
        }
    }
}

fn default_limit() -> usize {
    5
}

impl Config {
    /// Vector size of the collection. Only available when embeddings are configured.
    pub fn vector_dims(&self) -> Result<usize> {
        match self.embedding.dims {
            Some(d) if d > 0 => Ok(d),
            _ => bail!("embedding.dims must be set to use the vector collection"),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate a TOML document.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate qdrant
    if config.qdrant.collection.trim().is_empty() {
        bail!("qdrant.collection must not be empty");
    }
    if config.qdrant.url.trim().is_empty() {
        bail!("qdrant.url must not be empty");
    }

    // Validate chunking
    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        bail!(
            "chunking.overlap ({}) must be < chunking.chunk_size ({})",
            config.chunking.overlap,
            config.chunking.chunk_size
        );
    }

    // Validate retrieval
    if config.retrieval.limit < 1 {
        bail!("retrieval.limit must be >= 1");
    }
    if let Some(score) = config.retrieval.min_score {
        if !(-1.0..=1.0).contains(&score) {
            bail!("retrieval.min_score must be in [-1.0, 1.0]");
        }
    }

    // Validate ingest
    if config.ingest.include_globs.is_empty() {
        bail!("ingest.include_globs must list at least one pattern");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "azure" | "ollama" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, azure, or ollama.",
            other
        ),
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    if config.embedding.provider == "azure" {
        if config.embedding.url.is_none() {
            bail!("embedding.url (resource endpoint) is required for provider 'azure'");
        }
        if config.embedding.deployment.is_none() {
            bail!("embedding.deployment is required for provider 'azure'");
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[qdrant]
url = "http://localhost:6333"
"#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.qdrant.collection, "documents");
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.overlap, 100);
        assert_eq!(config.retrieval.limit, 5);
        assert_eq!(config.ingest.include_globs, vec!["**/*.pdf"]);
        assert_eq!(
            config.ingest.ledger_path,
            PathBuf::from("./data/processed_files.json")
        );
        assert!(!config.embedding.is_enabled());
        assert_eq!(config.embedding.request_delay_ms, 100);
        assert!(config.vector_dims().is_err());
    }

    #[test]
    fn test_full_config() {
        let config = parse_config(
            r#"
[qdrant]
url = "http://qdrant:6333"
collection = "manuals"
timeout_secs = 5

[embedding]
provider = "ollama"
model = "nomic-embed-text"
dims = 768
url = "http://ollama:11434"
request_delay_ms = 0

[chunking]
chunk_size = 800
overlap = 0

[ingest]
ledger_path = "/var/lib/docvec/ledger.json"
include_globs = ["**/*.pdf", "**/*.md"]
follow_symlinks = true

[retrieval]
limit = 10
min_score = 0.3
"#,
        )
        .unwrap();
        assert_eq!(config.qdrant.collection, "manuals");
        assert_eq!(config.embedding.provider, "ollama");
        assert_eq!(config.vector_dims().unwrap(), 768);
        assert_eq!(config.chunking.overlap, 0);
        assert!(config.ingest.follow_symlinks);
        assert_eq!(config.retrieval.min_score, Some(0.3));
    }

    #[test]
    fn test_missing_qdrant_section() {
        assert!(parse_config("[chunking]\nchunk_size = 10\n").is_err());
    }

    #[test]
    fn test_overlap_must_be_smaller() {
        let err = parse_config(&format!("{}\n[chunking]\nchunk_size = 100\noverlap = 100\n", MINIMAL))
            .unwrap_err();
        assert!(err.to_string().contains("chunking.overlap"));
    }

    #[test]
    fn test_unknown_provider() {
        let err = parse_config(&format!("{}\n[embedding]\nprovider = \"cohere\"\n", MINIMAL))
            .unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_enabled_provider_requires_dims_and_model() {
        let err = parse_config(&format!(
            "{}\n[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\n",
            MINIMAL
        ))
        .unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));

        let err = parse_config(&format!(
            "{}\n[embedding]\nprovider = \"openai\"\ndims = 1536\n",
            MINIMAL
        ))
        .unwrap_err();
        assert!(err.to_string().contains("embedding.model"));
    }

    #[test]
    fn test_azure_requires_deployment() {
        let err = parse_config(&format!(
            "{}\n[embedding]\nprovider = \"azure\"\nmodel = \"m\"\ndims = 3\nurl = \"https://x.openai.azure.com\"\n",
            MINIMAL
        ))
        .unwrap_err();
        assert!(err.to_string().contains("deployment"));
    }

    #[test]
    fn test_min_score_range() {
        let err = parse_config(&format!("{}\n[retrieval]\nmin_score = 1.5\n", MINIMAL)).unwrap_err();
        assert!(err.to_string().contains("min_score"));
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Path::new("/nonexistent/docvec.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_example_config_parses() {
        let config = parse_config(include_str!("../config/docvec.example.toml")).unwrap();
        assert_eq!(config.embedding.provider, "ollama");
        assert_eq!(config.vector_dims().unwrap(), 768);
        assert_eq!(config.chunking.chunk_size, 500);
    }
}
