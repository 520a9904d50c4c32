//! Sequential embedding of a file's chunks.
//!
//! [`EmbeddingOrchestrator::embed_all`] embeds texts one at a time, in
//! order, pausing `request_delay` between provider calls. Output order and
//! length always match the input. The first failure aborts the batch: a
//! file is stored with all of its chunks or none of them.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use docvec_core::embedding::EmbeddingProvider;
use docvec_core::error::{Cancelled, DimensionMismatch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::EmbeddingConfig;

pub struct EmbeddingOrchestrator {
    provider: Arc<dyn EmbeddingProvider>,
    request_delay: Duration,
}

impl EmbeddingOrchestrator {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, request_delay: Duration) -> Self {
        Self {
            provider,
            request_delay,
        }
    }

    pub fn from_config(provider: Arc<dyn EmbeddingProvider>, config: &EmbeddingConfig) -> Self {
        Self::new(provider, Duration::from_millis(config.request_delay_ms))
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Embed every text, checking `cancel` before each provider call.
    ///
    /// Every vector must have the provider's declared dimensionality.
    pub async fn embed_all(
        &self,
        texts: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<f32>>> {
        let total = texts.len();
        let expected = self.provider.dims();
        let mut vectors = Vec::with_capacity(total);

        for (i, text) in texts.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(Cancelled.into());
            }
            if i > 0 && !self.request_delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(Cancelled.into()),
                    _ = tokio::time::sleep(self.request_delay) => {}
                }
            }

            let vector = self
                .provider
                .embed(text)
                .await
                .with_context(|| format!("embedding chunk {} of {}", i + 1, total))?;

            if vector.len() != expected {
                return Err(anyhow::Error::new(DimensionMismatch {
                    expected,
                    actual: vector.len(),
                })
                .context(format!("embedding chunk {} of {}", i + 1, total)));
            }
            vectors.push(vector);
        }

        debug!(
            chunks = total,
            model = self.provider.model_name(),
            "embedded chunks"
        );
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use async_trait::async_trait;
    use docvec_core::error::is_cancelled;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Encodes the text length into the vector; fails on a chosen call.
    struct ScriptedProvider {
        dims: usize,
        fail_on: Option<usize>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(dims: usize, fail_on: Option<usize>) -> Self {
            Self {
                dims,
                fail_on,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for ScriptedProvider {
        fn model_name(&self) -> &str {
            "scripted"
        }
        fn dims(&self) -> usize {
            self.dims
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(call) == self.fail_on {
                bail!("provider timeout");
            }
            Ok(vec![text.len() as f32; 2])
        }
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_order_and_length_preserved() {
        let provider = Arc::new(ScriptedProvider::new(2, None));
        let orchestrator = EmbeddingOrchestrator::new(provider.clone(), Duration::ZERO);
        let vectors = orchestrator
            .embed_all(&texts(&["a", "bbb", "cc"]), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0; 2], vec![3.0; 2], vec![2.0; 2]]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let orchestrator =
            EmbeddingOrchestrator::new(Arc::new(ScriptedProvider::new(2, None)), Duration::ZERO);
        let vectors = orchestrator
            .embed_all(&[], &CancellationToken::new())
            .await
            .unwrap();
        assert!(vectors.is_empty());
    }

    #[tokio::test]
    async fn test_first_failure_aborts_batch() {
        let provider = Arc::new(ScriptedProvider::new(2, Some(1)));
        let orchestrator = EmbeddingOrchestrator::new(provider.clone(), Duration::ZERO);
        let err = orchestrator
            .embed_all(&texts(&["a", "b", "c", "d"]), &CancellationToken::new())
            .await
            .unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("embedding chunk 2 of 4"), "{}", message);
        assert!(message.contains("provider timeout"), "{}", message);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        // Provider declares 3 dims but returns 2.
        let orchestrator =
            EmbeddingOrchestrator::new(Arc::new(ScriptedProvider::new(3, None)), Duration::ZERO);
        let err = orchestrator
            .embed_all(&texts(&["a"]), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<DimensionMismatch>().is_some());
    }

    #[tokio::test]
    async fn test_cancelled_before_first_call() {
        let provider = Arc::new(ScriptedProvider::new(2, None));
        let orchestrator = EmbeddingOrchestrator::new(provider.clone(), Duration::ZERO);
        let token = CancellationToken::new();
        token.cancel();
        let err = orchestrator
            .embed_all(&texts(&["a", "b"]), &token)
            .await
            .unwrap_err();
        assert!(is_cancelled(&err));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_delay() {
        let provider = Arc::new(ScriptedProvider::new(2, None));
        let orchestrator = EmbeddingOrchestrator::new(provider.clone(), Duration::from_secs(60));
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });
        let err = orchestrator
            .embed_all(&texts(&["a", "b"]), &token)
            .await
            .unwrap_err();
        assert!(is_cancelled(&err));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
