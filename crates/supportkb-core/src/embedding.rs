//! Embedding port: turns text into a fixed-dimension vector.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Text → vector model. The dimension is fixed per deployment.
///
/// Failures are never fatal to callers: indexing skips the chunk, retrieval answers
/// with no context.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single string.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Embed several strings, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Length of every vector this embedder produces.
    fn dimension(&self) -> usize;
}

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("text to embed must not be empty")]
    EmptyInput,
    #[error("invalid Ollama URL: {0}")]
    ParseUrl(#[from] url::ParseError),
    #[error("Ollama request failed: {0}")]
    Request(#[from] ollama_rs::error::OllamaError),
    #[error("embedding request timed out after {0:?}")]
    Timeout(Duration),
    #[error("model returned no embedding")]
    EmptyResponse,
    #[error("model returned {actual}-dimensional embedding, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}
