//! # docvec core
//!
//! Shared, I/O-free logic for docvec: the document data model, the
//! sentence/paragraph/character chunker, the embedding-provider trait, the
//! point-level [`store::VectorStore`] abstraction with an in-memory backend,
//! and the [`repository::DocumentRepository`] that maps documents onto
//! points and builds search filters.
//!
//! This crate performs no network or filesystem access. Concrete backends
//! (Qdrant, OpenAI, PDF extraction) live in the `docvec` application crate.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod models;
pub mod repository;
pub mod store;
