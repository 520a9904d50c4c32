//! # docvec
//!
//! PDF ingestion and retrieval over a Qdrant collection.
//!
//! docvec hashes each source file, skips files it has already processed,
//! extracts plain text, splits it into overlapping passages, embeds every
//! passage and stores the vectors with their metadata. Stored passages can
//! then be searched by similarity, filtered by file name and processing
//! date.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌─────────┐   ┌──────────┐   ┌──────────┐
//! │  Ledger  │──▶│ Extract │──▶│  Chunk  │──▶│  Embed   │──▶│  Qdrant  │
//! │  (hash)  │   │ PDF/txt │   │ overlap │   │ provider │   │  points  │
//! └──────────┘   └─────────┘   └─────────┘   └──────────┘   └────┬─────┘
//!                                                                │
//!                                                        ┌───────┴──────┐
//!                                                        │ search / get │
//!                                                        └──────────────┘
//! ```
//!
//! Pure logic (data model, chunker, repository, store trait) lives in the
//! `docvec-core` crate; this crate adds configuration, I/O backends and the
//! `docvec` CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`tracker`] | File hashing and the processed-file ledger |
//! | [`extract`] | PDF and plain-text extraction |
//! | [`embedding`] | OpenAI / Azure OpenAI / Ollama providers |
//! | [`embedder`] | Sequential, cancellable chunk embedding |
//! | [`qdrant`] | Qdrant REST vector store |
//! | [`ingest`] | Per-file processing orchestration |
//! | [`search`] | `docvec search` |
//! | [`get`] | `docvec get` |
//! | [`delete`] | `docvec delete` |
//! | [`stats`] | `docvec stats` |

pub mod config;
pub mod delete;
pub mod embedder;
pub mod embedding;
pub mod extract;
pub mod get;
pub mod ingest;
pub mod qdrant;
pub mod search;
pub mod stats;
pub mod tracker;

pub use docvec_core::{chunk, error, models, repository, store};
