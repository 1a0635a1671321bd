//! Embedding model access with bounded retry.

mod http;

pub use http::HttpEmbedder;

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::{Result, SyncError};

/// Text used by [`EmbeddingClient::verify_dimension`] at startup.
const DIMENSION_PROBE_TEXT: &str = "dimension probe";

/// Opaque text-to-vector function implemented by a concrete transport.
///
/// The pipeline treats the model as a black box; any returned error is
/// considered transient and eligible for retry.
#[async_trait]
pub trait EmbedModel: Send + Sync {
    /// Produces one embedding vector for the given text.
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// Retry-policy wrapper around an [`EmbedModel`].
///
/// Structurally invalid input (blank text) fails immediately without
/// consuming any retry budget; model failures are retried up to the
/// configured bound with a fixed inter-attempt delay.
pub struct EmbeddingClient {
    model: Box<dyn EmbedModel>,
    dimension: usize,
    max_attempts: usize,
    retry_delay: Duration,
}

impl EmbeddingClient {
    /// Wraps `model` with the given retry policy and expected dimension.
    pub fn new(
        model: Box<dyn EmbedModel>,
        dimension: usize,
        max_attempts: usize,
        retry_delay: Duration,
    ) -> Self {
        Self {
            model,
            dimension,
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    /// Configured embedding dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embeds one text, retrying transient model failures.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(SyncError::Input("projection text is blank".to_string()));
        }

        let mut attempt = 0usize;
        loop {
            attempt += 1;
            match self.model.embed(text).await {
                Ok(vector) => {
                    if vector.len() != self.dimension {
                        // Wrong-size output will not improve on retry.
                        return Err(SyncError::Embedding {
                            attempts: attempt,
                            source: anyhow::anyhow!(
                                "model returned {} dimensions, expected {}",
                                vector.len(),
                                self.dimension
                            ),
                        });
                    }
                    return Ok(vector);
                }
                Err(err) => {
                    if attempt >= self.max_attempts {
                        return Err(SyncError::Embedding {
                            attempts: attempt,
                            source: err,
                        });
                    }
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "embedding attempt failed; retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }

    /// Embeds a fixed probe string and checks the configured dimension.
    ///
    /// Run once at startup; a mismatch means the model and the vector
    /// tables disagree and the run must not proceed.
    pub async fn verify_dimension(&self) -> Result<()> {
        let vector = self
            .model
            .embed(DIMENSION_PROBE_TEXT)
            .await
            .map_err(|err| SyncError::Config(format!("embedding model probe failed: {err}")))?;
        if vector.len() != self.dimension {
            return Err(SyncError::Config(format!(
                "embedding dimension mismatch: model returned {}, configured {}",
                vector.len(),
                self.dimension
            )));
        }
        Ok(())
    }
}
