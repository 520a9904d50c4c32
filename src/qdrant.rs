//! Qdrant REST backend for the [`VectorStore`] trait.
//!
//! Talks to a single collection over Qdrant's HTTP API with `reqwest`:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | ensure collection | `GET /collections/{c}`, then `PUT /collections/{c}` if 404 |
//! | point exists | `GET /collections/{c}/points/{id}` |
//! | upsert | `PUT /collections/{c}/points?wait=true` |
//! | retrieve | `POST /collections/{c}/points` |
//! | delete | `POST /collections/{c}/points/delete?wait=true` |
//! | scroll | `POST /collections/{c}/points/scroll`, following `next_page_offset` |
//! | search | `POST /collections/{c}/points/search` |
//! | count | `POST /collections/{c}/points/count` |
//!
//! Point ids are UUID strings end to end. Numeric ids written by other
//! tools are read back as their decimal string.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use docvec_core::repository::{format_timestamp, DocumentRepository};
use docvec_core::store::{Condition, Filter, Payload, Point, ScoredPoint, VectorStore};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::{Config, QdrantConfig};

/// Points requested per scroll page.
const SCROLL_PAGE_SIZE: usize = 256;

pub struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
}

impl QdrantStore {
    pub fn new(base_url: &str, collection: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
        })
    }

    pub fn from_config(config: &QdrantConfig) -> Result<Self> {
        Self::new(
            &config.url,
            &config.collection,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    fn points_url(&self, suffix: &str) -> String {
        format!("{}/points{}", self.collection_url(), suffix)
    }

    /// Send a request and return the `result` field of a 2xx response.
    async fn call(&self, request: reqwest::RequestBuilder, what: &str) -> Result<Value> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Qdrant {} request failed", what))?;
        let body = read_success(response, what).await?;
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Vector size of the existing collection, or `None` if it does not exist.
    async fn collection_size(&self) -> Result<Option<usize>> {
        let response = self
            .client
            .get(self.collection_url())
            .send()
            .await
            .context("Qdrant get collection request failed")?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = read_success(response, "get collection").await?;
        let size = body
            .pointer("/result/config/params/vectors/size")
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                anyhow!(
                    "collection {} has no single unnamed vector configuration",
                    self.collection
                )
            })?;
        Ok(Some(size as usize))
    }
}

async fn read_success(response: reqwest::Response, what: &str) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("Qdrant {} failed: HTTP {}: {}", what, status, body_text);
    }
    response
        .json()
        .await
        .with_context(|| format!("Qdrant {} returned invalid JSON", what))
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self, dims: usize) -> Result<()> {
        match self.collection_size().await? {
            Some(existing) if existing == dims => {
                debug!(collection = %self.collection, dims, "collection exists");
                Ok(())
            }
            Some(existing) => bail!(
                "collection {} has vector size {}, but embedding.dims is {}",
                self.collection,
                existing,
                dims
            ),
            None => {
                let body = json!({ "vectors": { "size": dims, "distance": "Cosine" } });
                self.call(
                    self.client.put(self.collection_url()).json(&body),
                    "create collection",
                )
                .await?;
                info!(collection = %self.collection, dims, "created collection");
                Ok(())
            }
        }
    }

    async fn point_exists(&self, id: &str) -> Result<bool> {
        let response = self
            .client
            .get(self.points_url(&format!("/{}", id)))
            .send()
            .await
            .context("Qdrant get point request failed")?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        read_success(response, "get point").await?;
        Ok(true)
    }

    async fn upsert_points(&self, points: &[Point]) -> Result<()> {
        let body = json!({
            "points": points.iter().map(point_to_json).collect::<Vec<_>>(),
        });
        self.call(
            self.client.put(self.points_url("?wait=true")).json(&body),
            "upsert",
        )
        .await?;
        Ok(())
    }

    async fn get_points(&self, ids: &[String], with_vector: bool) -> Result<Vec<Point>> {
        let body = json!({
            "ids": ids,
            "with_payload": true,
            "with_vector": with_vector,
        });
        let result = self
            .call(self.client.post(self.points_url("")).json(&body), "retrieve")
            .await?;
        parse_points(&result)
    }

    async fn delete_points(&self, ids: &[String]) -> Result<()> {
        let body = json!({ "points": ids });
        self.call(
            self.client
                .post(self.points_url("/delete?wait=true"))
                .json(&body),
            "delete",
        )
        .await?;
        Ok(())
    }

    async fn scroll(&self, filter: &Filter, with_vector: bool) -> Result<Vec<Point>> {
        let mut points = Vec::new();
        let mut offset = Value::Null;

        loop {
            let mut body = json!({
                "limit": SCROLL_PAGE_SIZE,
                "with_payload": true,
                "with_vector": with_vector,
            });
            if !filter.is_empty() {
                body["filter"] = filter_to_json(filter);
            }
            if !offset.is_null() {
                body["offset"] = offset;
            }

            let result = self
                .call(
                    self.client.post(self.points_url("/scroll")).json(&body),
                    "scroll",
                )
                .await?;
            points.extend(parse_points(result.get("points").unwrap_or(&Value::Null))?);

            offset = result
                .get("next_page_offset")
                .cloned()
                .unwrap_or(Value::Null);
            if offset.is_null() {
                break;
            }
        }

        Ok(points)
    }

    async fn search(
        &self,
        vector: &[f32],
        filter: Option<&Filter>,
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredPoint>> {
        let mut body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
            "with_vector": false,
        });
        if let Some(threshold) = score_threshold {
            body["score_threshold"] = json!(threshold);
        }
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            body["filter"] = filter_to_json(filter);
        }

        let result = self
            .call(
                self.client.post(self.points_url("/search")).json(&body),
                "search",
            )
            .await?;
        let hits = result
            .as_array()
            .ok_or_else(|| anyhow!("Qdrant search: result is not an array"))?;

        hits.iter()
            .map(|hit| -> Result<ScoredPoint> {
                Ok(ScoredPoint {
                    id: parse_id(hit)?,
                    score: hit
                        .get("score")
                        .and_then(Value::as_f64)
                        .ok_or_else(|| anyhow!("Qdrant search: hit without score"))?
                        as f32,
                    payload: parse_payload(hit),
                })
            })
            .collect()
    }

    async fn count(&self) -> Result<u64> {
        let result = self
            .call(
                self.client
                    .post(self.points_url("/count"))
                    .json(&json!({ "exact": true })),
                "count",
            )
            .await?;
        result
            .get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| anyhow!("Qdrant count: missing count"))
    }
}

/// Render a filter in Qdrant's JSON filter syntax.
pub fn filter_to_json(filter: &Filter) -> Value {
    let must: Vec<Value> = filter
        .must
        .iter()
        .map(|condition| match condition {
            Condition::MatchAny { key, any } => json!({
                "key": key,
                "match": { "any": any },
            }),
            Condition::DatetimeRange { key, gte, lte } => {
                let mut range = serde_json::Map::new();
                if let Some(gte) = gte {
                    range.insert("gte".into(), json!(format_timestamp(gte)));
                }
                if let Some(lte) = lte {
                    range.insert("lte".into(), json!(format_timestamp(lte)));
                }
                json!({ "key": key, "range": range })
            }
        })
        .collect();
    json!({ "must": must })
}

fn point_to_json(point: &Point) -> Value {
    json!({
        "id": point.id,
        "vector": point.vector,
        "payload": point.payload,
    })
}

fn parse_id(value: &Value) -> Result<String> {
    match value.get("id") {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => bail!("Qdrant point without id"),
    }
}

fn parse_payload(value: &Value) -> Payload {
    match value.get("payload") {
        Some(Value::Object(map)) => map.clone(),
        _ => Payload::new(),
    }
}

fn parse_vector(value: &Value) -> Vec<f32> {
    value
        .get("vector")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_points(value: &Value) -> Result<Vec<Point>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Null => return Ok(Vec::new()),
        _ => bail!("Qdrant: expected a list of points"),
    };
    items
        .iter()
        .map(|item| -> Result<Point> {
            Ok(Point {
                id: parse_id(item)?,
                vector: parse_vector(item),
                payload: parse_payload(item),
            })
        })
        .collect()
}

/// Repository over the configured Qdrant collection, without a query embedder.
pub fn open_repository(config: &Config) -> Result<DocumentRepository> {
    let store = QdrantStore::from_config(&config.qdrant)?;
    Ok(DocumentRepository::new(
        std::sync::Arc::new(store),
        config.vector_dims()?,
    ))
}
