//! In-memory [`VectorStore`] implementation for tests and embedding.
//!
//! Points live in an insertion-ordered `Vec` behind `std::sync::RwLock`.
//! Search is brute-force cosine similarity over every stored vector; ties
//! keep insertion order.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::DimensionMismatch;

use super::{Filter, Point, ScoredPoint, VectorStore};

#[derive(Default)]
struct Collection {
    dims: Option<usize>,
    points: Vec<Point>,
}

/// In-memory store holding a single collection.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Collection>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Collection>> {
        self.inner
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Collection>> {
        self.inner
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }
}

fn project(point: &Point, with_vector: bool) -> Point {
    Point {
        id: point.id.clone(),
        vector: if with_vector {
            point.vector.clone()
        } else {
            Vec::new()
        },
        payload: point.payload.clone(),
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn ensure_collection(&self, dims: usize) -> Result<()> {
        let mut collection = self.write()?;
        match collection.dims {
            None => collection.dims = Some(dims),
            Some(existing) if existing != dims => bail!(
                "collection exists with vector size {}, configured size is {}",
                existing,
                dims
            ),
            Some(_) => {}
        }
        Ok(())
    }

    async fn point_exists(&self, id: &str) -> Result<bool> {
        Ok(self.read()?.points.iter().any(|p| p.id == id))
    }

    async fn upsert_points(&self, points: &[Point]) -> Result<()> {
        let mut collection = self.write()?;
        let dims = match collection.dims {
            Some(d) => d,
            None => bail!("collection has not been created"),
        };
        // Validate the whole batch before touching anything.
        for point in points {
            if point.vector.len() != dims {
                return Err(DimensionMismatch {
                    expected: dims,
                    actual: point.vector.len(),
                }
                .into());
            }
        }
        for point in points {
            match collection.points.iter_mut().find(|p| p.id == point.id) {
                Some(existing) => *existing = point.clone(),
                None => collection.points.push(point.clone()),
            }
        }
        Ok(())
    }

    async fn get_points(&self, ids: &[String], with_vector: bool) -> Result<Vec<Point>> {
        let collection = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| collection.points.iter().find(|p| &p.id == id))
            .map(|p| project(p, with_vector))
            .collect())
    }

    async fn delete_points(&self, ids: &[String]) -> Result<()> {
        let mut collection = self.write()?;
        collection.points.retain(|p| !ids.contains(&p.id));
        Ok(())
    }

    async fn scroll(&self, filter: &Filter, with_vector: bool) -> Result<Vec<Point>> {
        let collection = self.read()?;
        Ok(collection
            .points
            .iter()
            .filter(|p| filter.matches(&p.payload))
            .map(|p| project(p, with_vector))
            .collect())
    }

    async fn search(
        &self,
        vector: &[f32],
        filter: Option<&Filter>,
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredPoint>> {
        let collection = self.read()?;
        if let Some(dims) = collection.dims {
            if vector.len() != dims {
                return Err(DimensionMismatch {
                    expected: dims,
                    actual: vector.len(),
                }
                .into());
            }
        }

        let mut hits: Vec<ScoredPoint> = collection
            .points
            .iter()
            .filter(|p| filter.map_or(true, |f| f.matches(&p.payload)))
            .map(|p| ScoredPoint {
                id: p.id.clone(),
                score: cosine_similarity(vector, &p.vector),
                payload: p.payload.clone(),
            })
            .filter(|hit| score_threshold.map_or(true, |t| hit.score >= t))
            .collect();

        // Stable sort: equal scores keep insertion order.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.read()?.points.len() as u64)
    }
}
