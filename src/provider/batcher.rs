//! Order-preserving batched embedding.
//!
//! [`EmbeddingBatcher`] splits an input list into contiguous batches, sends
//! them one after another, and reassembles the vectors so that output
//! position `i` always belongs to input `i`. A failed batch leaves its
//! positions absent without affecting the others.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ProviderError;

/// Splits embedding work into sequential, paced batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddingBatcher {
    batch_size: usize,
    pacing: Duration,
}

impl EmbeddingBatcher {
    /// Creates a batcher. A zero batch size is treated as one.
    #[must_use]
    pub fn new(batch_size: usize, pacing: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            pacing,
        }
    }

    /// Texts per batch.
    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Embeds `texts` through `embed_batch`, one batch at a time.
    ///
    /// The result always has `texts.len()` entries. Positions of a batch
    /// whose call failed, or returned the wrong number of vectors, are
    /// `None`. Once `cancel` fires, every position not yet sent is `None`.
    /// After each batch the batcher pauses for the configured pacing.
    pub async fn run<F, Fut>(
        &self,
        texts: &[String],
        cancel: &CancellationToken,
        mut embed_batch: F,
    ) -> Vec<Option<Vec<f32>>>
    where
        F: FnMut(Vec<String>) -> Fut,
        Fut: Future<Output = Result<Vec<Vec<f32>>, ProviderError>>,
    {
        let mut results: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());

        for (index, batch) in texts.chunks(self.batch_size).enumerate() {
            if cancel.is_cancelled() {
                debug!(batch = index, "embedding cancelled, leaving remaining texts empty");
                break;
            }

            match embed_batch(batch.to_vec()).await {
                Ok(vectors) if vectors.len() == batch.len() => {
                    results.extend(vectors.into_iter().map(Some));
                }
                Ok(vectors) => {
                    warn!(
                        batch = index,
                        expected = batch.len(),
                        received = vectors.len(),
                        "embedding batch returned wrong vector count"
                    );
                    results.extend(std::iter::repeat_n(None, batch.len()));
                }
                Err(e) => {
                    warn!(batch = index, size = batch.len(), error = %e, "embedding batch failed");
                    results.extend(std::iter::repeat_n(None, batch.len()));
                }
            }

            if !self.pacing.is_zero() {
                tokio::select! {
                    () = cancel.cancelled() => {}
                    () = tokio::time::sleep(self.pacing) => {}
                }
            }
        }

        results.resize(texts.len(), None);
        debug_assert_eq!(results.len(), texts.len());
        results
    }
}
