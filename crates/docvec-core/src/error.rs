//! Typed errors that callers branch on.
//!
//! Most fallible functions in docvec return [`anyhow::Result`]. The types
//! here are the ones an orchestrator needs to recognise after the fact
//! (via [`anyhow::Error::downcast_ref`]): contract violations abort a run,
//! data errors fail a single file, cancellation stops the run.

use thiserror::Error;

/// Contract violations raised immediately by the caller-facing API.
///
/// These are never isolated per file: a processing run that hits one
/// aborts, because every subsequent file would fail the same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("chunk target size must be greater than zero")]
    ZeroTargetSize,

    #[error("chunk overlap ({overlap}) must be smaller than target size ({target_size})")]
    OverlapTooLarge { overlap: usize, target_size: usize },

    #[error("search query requires either text or a vector")]
    MissingQueryInput,

    #[error("search query accepts text or a vector, not both")]
    AmbiguousQueryInput,

    #[error("search limit must be at least 1")]
    ZeroLimit,
}

/// An embedding vector whose length differs from the collection's.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("embedding dimension mismatch: expected {expected}, got {actual}")]
pub struct DimensionMismatch {
    pub expected: usize,
    pub actual: usize,
}

/// The run's cancellation token fired at a stage boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Returns true if `err` (or anything in its chain) is a [`ValidationError`].
pub fn is_validation_error(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.downcast_ref::<ValidationError>().is_some())
}

/// Returns true if `err` (or anything in its chain) is [`Cancelled`].
pub fn is_cancelled(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.downcast_ref::<Cancelled>().is_some())
}
