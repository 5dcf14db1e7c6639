//! Ollama-backed [`Embedder`]. Wraps ollama-rs with a per-request timeout and a
//! dimension check against the configured model.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use ollama_rs::Ollama;
use tracing::{debug, error};

use crate::config::OllamaConfig;
use crate::embedding::{EmbedError, Embedder};

pub const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
/// nomic-embed-text produces 768-dimensional vectors.
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    inner: Ollama,
    embed_model: String,
    dimension: usize,
    timeout: Duration,
}

impl OllamaEmbedder {
    /// Create from URL string with the default model, dimension and timeout.
    pub fn from_url(url: &str) -> Result<Self, EmbedError> {
        let inner = Ollama::try_new(url)?;
        Ok(Self {
            inner,
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn from_config(config: &OllamaConfig) -> Result<Self, EmbedError> {
        Ok(Self::from_url(&config.base_url)?
            .with_embed_model(config.embed_model.clone())
            .with_dimension(config.embedding_dimension)
            .with_timeout(Duration::from_secs(config.timeout_secs)))
    }

    /// Set the embedding model (e.g. `nomic-embed-text`, `all-minilm`).
    pub fn with_embed_model(mut self, model: impl Into<String>) -> Self {
        self.embed_model = model.into();
        self
    }

    /// Set the dimension the model is expected to produce.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn embed_model(&self) -> &str {
        &self.embed_model
    }

    async fn with_deadline<T>(
        &self,
        fut: impl Future<Output = Result<T, ollama_rs::error::OllamaError>>,
    ) -> Result<T, EmbedError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res.map_err(EmbedError::Request),
            Err(_) => Err(EmbedError::Timeout(self.timeout)),
        }
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<(), EmbedError> {
        if embedding.len() == self.dimension {
            return Ok(());
        }
        error!(
            model = %self.embed_model,
            expected = self.dimension,
            actual = embedding.len(),
            "embedding model returned unexpected dimension"
        );
        Err(EmbedError::DimensionMismatch {
            expected: self.dimension,
            actual: embedding.len(),
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        if text.trim().is_empty() {
            return Err(EmbedError::EmptyInput);
        }
        let req = GenerateEmbeddingsRequest::new(
            self.embed_model.clone(),
            EmbeddingsInput::Single(text.to_string()),
        );
        let res = self.with_deadline(self.inner.generate_embeddings(req)).await?;
        let embedding = res.embeddings.into_iter().next().ok_or(EmbedError::EmptyResponse)?;
        self.check_dimension(&embedding)?;
        debug!(model = %self.embed_model, chars = text.len(), "embedded text");
        Ok(embedding)
    }

    /// One request for all inputs.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(EmbedError::EmptyInput);
        }
        let req = GenerateEmbeddingsRequest::new(
            self.embed_model.clone(),
            EmbeddingsInput::Multiple(texts.to_vec()),
        );
        let res = self.with_deadline(self.inner.generate_embeddings(req)).await?;
        if res.embeddings.len() != texts.len() {
            return Err(EmbedError::EmptyResponse);
        }
        for embedding in &res.embeddings {
            self.check_dimension(embedding)?;
        }
        Ok(res.embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
