//! Embedding provider implementations.
//!
//! Concrete backends for the [`EmbeddingProvider`] trait defined in
//! `docvec-core`:
//! - **[`DisabledProvider`]**: returns errors; used when embeddings are not configured.
//! - **[`OpenAIProvider`]**: `POST {url}/v1/embeddings` with a bearer key.
//! - **[`AzureOpenAIProvider`]**: `POST {endpoint}/openai/deployments/{deployment}/embeddings`
//!   with an `api-key` header.
//! - **[`OllamaProvider`]**: `POST {url}/api/embed` on a local Ollama instance.
//!
//! Each call embeds exactly one text in exactly one HTTP request. There is
//! no retry: a failed call surfaces to the caller, which decides whether
//! the whole file fails.
//!
//! # Provider Selection
//!
//! Use [`create_provider`] to instantiate the provider named in the config:
//!
//! ```rust,no_run
//! # use docvec::config::EmbeddingConfig;
//! # use docvec::embedding::create_provider;
//! let config = EmbeddingConfig::default(); // provider = "disabled"
//! let provider = create_provider(&config).unwrap();
//! assert_eq!(provider.model_name(), "disabled");
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use docvec_core::embedding::EmbeddingProvider;
use serde_json::Value;

use crate::config::EmbeddingConfig;

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

/// Instantiate the provider selected by `config.provider`.
///
/// # Errors
///
/// Returns an error for unknown provider names or if the provider cannot
/// be initialized (missing model, dims, endpoint or API key).
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        "azure" => Ok(Arc::new(AzureOpenAIProvider::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

fn http_client(config: &EmbeddingConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .context("building HTTP client")
}

fn required_model(config: &EmbeddingConfig, provider: &str) -> Result<String> {
    config
        .model
        .clone()
        .ok_or_else(|| anyhow!("embedding.model required for {} provider", provider))
}

fn required_dims(config: &EmbeddingConfig, provider: &str) -> Result<usize> {
    config
        .dims
        .ok_or_else(|| anyhow!("embedding.dims required for {} provider", provider))
}

/// Send a prepared request and return the JSON body of a 2xx response.
async fn send_json(provider: &str, request: reqwest::RequestBuilder) -> Result<Value> {
    let response = request
        .send()
        .await
        .with_context(|| format!("{} request failed", provider))?;
    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("{} API error {}: {}", provider, status, body_text);
    }
    response
        .json()
        .await
        .with_context(|| format!("{} response is not valid JSON", provider))
}

fn first_embedding(provider: &str, mut vectors: Vec<Vec<f32>>) -> Result<Vec<f32>> {
    if vectors.is_empty() {
        bail!("{} returned no embedding", provider);
    }
    Ok(vectors.swap_remove(0))
}

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
///
/// Used when `embedding.provider = "disabled"` in the configuration.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("Embedding provider is disabled")
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Requires the `OPENAI_API_KEY` environment variable. `embedding.url`
/// overrides the API base for OpenAI-compatible servers.
pub struct OpenAIProvider {
    client: reqwest::Client,
    model: String,
    dims: usize,
    endpoint: String,
    api_key: String,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &EmbeddingConfig, api_key: String) -> Result<Self> {
        let base = config.url.as_deref().unwrap_or(OPENAI_DEFAULT_URL);
        Ok(Self {
            client: http_client(config)?,
            model: required_model(config, "OpenAI")?,
            dims: required_dims(config, "OpenAI")?,
            endpoint: format!("{}/v1/embeddings", base.trim_end_matches('/')),
            api_key,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });
        let request = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body);
        let json = send_json("OpenAI", request).await?;
        first_embedding("OpenAI", parse_openai_response(&json)?)
    }
}

/// Parse an OpenAI-style embeddings response, ordered by `data[].index`.
pub fn parse_openai_response(json: &Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());

    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        let index = item
            .get("index")
            .and_then(Value::as_u64)
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, vec));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Azure OpenAI Provider ============

/// Embedding provider for an Azure OpenAI deployment.
///
/// `embedding.url` is the resource endpoint
/// (`https://{resource}.openai.azure.com`). Requires `AZURE_OPENAI_API_KEY`.
pub struct AzureOpenAIProvider {
    client: reqwest::Client,
    model: String,
    dims: usize,
    endpoint: String,
    api_key: String,
}

impl AzureOpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("AZURE_OPENAI_API_KEY")
            .map_err(|_| anyhow!("AZURE_OPENAI_API_KEY environment variable not set"))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &EmbeddingConfig, api_key: String) -> Result<Self> {
        let base = config
            .url
            .as_deref()
            .ok_or_else(|| anyhow!("embedding.url (resource endpoint) required for Azure provider"))?;
        let deployment = config
            .deployment
            .as_deref()
            .ok_or_else(|| anyhow!("embedding.deployment required for Azure provider"))?;
        Ok(Self {
            client: http_client(config)?,
            model: required_model(config, "Azure")?,
            dims: required_dims(config, "Azure")?,
            endpoint: format!(
                "{}/openai/deployments/{}/embeddings?api-version={}",
                base.trim_end_matches('/'),
                deployment,
                config.api_version
            ),
            api_key,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for AzureOpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({ "input": text });
        let request = self
            .client
            .post(&self.endpoint)
            .header("api-key", &self.api_key)
            .json(&body);
        let json = send_json("Azure OpenAI", request).await?;
        first_embedding("Azure OpenAI", parse_openai_response(&json)?)
    }
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured URL (default:
/// `http://localhost:11434`). Requires an embedding model pulled in Ollama
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaProvider {
    client: reqwest::Client,
    model: String,
    dims: usize,
    url: String,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            model: required_model(config, "Ollama")?,
            dims: required_dims(config, "Ollama")?,
            url: config
                .url
                .as_deref()
                .unwrap_or(OLLAMA_DEFAULT_URL)
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });
        let request = self
            .client
            .post(format!("{}/api/embed", self.url))
            .json(&body);
        let json = send_json("Ollama", request)
            .await
            .with_context(|| format!("is Ollama running at {}?", self.url))?;
        first_embedding("Ollama", parse_ollama_response(&json)?)
    }
}

pub fn parse_ollama_response(json: &Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?;

    let mut result = Vec::with_capacity(embeddings.len());

    for embedding in embeddings {
        let vec: Vec<f32> = embedding
            .as_array()
            .ok_or_else(|| anyhow!("Invalid Ollama response: embedding is not an array"))?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        result.push(vec);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(provider: &str, url: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: provider.to_string(),
            model: Some("test-model".to_string()),
            dims: Some(3),
            url: Some(url.to_string()),
            deployment: Some("embed-deploy".to_string()),
            ..EmbeddingConfig::default()
        }
    }

    #[test]
    fn test_parse_openai_response_orders_by_index() {
        let body = json!({
            "data": [
                { "index": 1, "embedding": [0.4, 0.5] },
                { "index": 0, "embedding": [0.1, 0.2] }
            ]
        });
        let vectors = parse_openai_response(&body).unwrap();
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.4, 0.5]]);
    }

    #[test]
    fn test_parse_openai_response_missing_data() {
        let err = parse_openai_response(&json!({ "error": "nope" })).unwrap_err();
        assert!(err.to_string().contains("missing data array"));
    }

    #[test]
    fn test_parse_ollama_response() {
        let body = json!({ "model": "m", "embeddings": [[1.0, 2.0, 3.0]] });
        assert_eq!(
            parse_ollama_response(&body).unwrap(),
            vec![vec![1.0, 2.0, 3.0]]
        );
        assert!(parse_ollama_response(&json!({ "embeddings": [1.0] })).is_err());
    }

    #[tokio::test]
    async fn test_disabled_provider_errors() {
        let provider = create_provider(&EmbeddingConfig::default()).unwrap();
        assert_eq!(provider.model_name(), "disabled");
        let err = provider.embed("hello").await.unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }

    #[test]
    fn test_unknown_provider() {
        let mut cfg = EmbeddingConfig::default();
        cfg.provider = "cohere".to_string();
        assert!(create_provider(&cfg).is_err());
    }

    #[tokio::test]
    async fn test_openai_single_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({ "model": "test-model", "input": "hello" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "index": 0, "embedding": [0.1, 0.2, 0.3] }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider =
            OpenAIProvider::with_api_key(&config("openai", &server.uri()), "sk-test".into())
                .unwrap();
        assert_eq!(provider.dims(), 3);
        assert_eq!(provider.embed("hello").await.unwrap(), vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn test_openai_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .expect(1)
            .mount(&server)
            .await;

        let provider =
            OpenAIProvider::with_api_key(&config("openai", &server.uri()), "sk-test".into())
                .unwrap();
        let err = provider.embed("hello").await.unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("429"), "{}", message);
        assert!(message.contains("slow down"), "{}", message);
    }

    #[tokio::test]
    async fn test_azure_request_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/deployments/embed-deploy/embeddings"))
            .and(query_param("api-version", "2024-02-01"))
            .and(header("api-key", "az-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "index": 0, "embedding": [1.0, 0.0, 0.0] }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider =
            AzureOpenAIProvider::with_api_key(&config("azure", &server.uri()), "az-key".into())
                .unwrap();
        assert_eq!(provider.embed("x").await.unwrap(), vec![1.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_ollama_request_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .and(body_partial_json(json!({ "model": "test-model", "input": "hi" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[0.5, 0.5, 0.0]] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = OllamaProvider::new(&config("ollama", &server.uri())).unwrap();
        assert_eq!(provider.embed("hi").await.unwrap(), vec![0.5, 0.5, 0.0]);
    }

    #[tokio::test]
    async fn test_ollama_empty_embeddings_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [] })))
            .mount(&server)
            .await;

        let provider = OllamaProvider::new(&config("ollama", &server.uri())).unwrap();
        let err = provider.embed("hi").await.unwrap_err();
        assert!(err.to_string().contains("no embedding"));
    }
}
