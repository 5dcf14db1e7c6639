//! Deterministic in-process embedders for tests.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::embedding::{EmbedError, Embedder};

/// Returns fixed vectors for known texts; unknown text fails like an unavailable model.
#[derive(Debug, Default)]
pub(crate) struct StaticEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    dimension: usize,
}

impl StaticEmbedder {
    pub(crate) fn new(dimension: usize) -> Self {
        Self {
            vectors: HashMap::new(),
            dimension,
        }
    }

    pub(crate) fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }
}

#[async_trait]
impl Embedder for StaticEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.vectors.get(text).cloned().ok_or(EmbedError::EmptyResponse)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// One dimension per keyword, counting occurrences (case-insensitive).
/// Text containing `fail_marker` fails to embed. `claimed_dimension` makes
/// `dimension()` disagree with the vectors actually returned.
#[derive(Debug)]
pub(crate) struct KeywordEmbedder {
    keywords: Vec<String>,
    fail_marker: Option<String>,
    claimed_dimension: Option<usize>,
}

impl KeywordEmbedder {
    pub(crate) fn new(keywords: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            fail_marker: None,
            claimed_dimension: None,
        }
    }

    pub(crate) fn failing_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_lowercase());
        self
    }

    pub(crate) fn claiming_dimension(mut self, dimension: usize) -> Self {
        self.claimed_dimension = Some(dimension);
        self
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let lower = text.to_lowercase();
        if self.fail_marker.as_deref().is_some_and(|m| lower.contains(m)) {
            return Err(EmbedError::EmptyResponse);
        }
        Ok(self
            .keywords
            .iter()
            .map(|k| lower.matches(k.as_str()).count() as f32)
            .collect())
    }

    fn dimension(&self) -> usize {
        self.claimed_dimension.unwrap_or(self.keywords.len())
    }
}
