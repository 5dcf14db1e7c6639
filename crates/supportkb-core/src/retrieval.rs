//! Retrieval pipeline: embed query → search index → one chunk per article → context string.
//!
//! Every call ends in exactly one of two outcomes, [`RetrievalResult::Context`] or
//! [`RetrievalResult::NoRelevantContext`]. Blank queries, small talk, embedding failures
//! and empty searches all map to the latter. Only index errors (dimension mismatch) are
//! returned as `Err`.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::chunks::Chunk;
use crate::config::RetrievalConfig;
use crate::embedding::Embedder;
use crate::small_talk::SmallTalkFilter;
use crate::store::{ScoredChunk, StoreError, VectorIndex};

/// Outcome of a retrieval call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalResult {
    /// Grounding text for the prompt.
    Context(String),
    /// Nothing relevant; the caller proceeds without knowledge-base framing.
    NoRelevantContext,
}

impl RetrievalResult {
    pub fn is_context(&self) -> bool {
        matches!(self, Self::Context(_))
    }

    pub fn into_context(self) -> Option<String> {
        match self {
            Self::Context(s) => Some(s),
            Self::NoRelevantContext => None,
        }
    }
}

/// Decides whether a message skips retrieval entirely.
pub type SmallTalkPredicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

pub struct RetrievalPipeline {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    config: RetrievalConfig,
    is_small_talk: SmallTalkPredicate,
}

impl RetrievalPipeline {
    /// Uses a [`SmallTalkFilter`] sized by `config.small_talk_max_words`.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        config: RetrievalConfig,
    ) -> Self {
        let filter = SmallTalkFilter::new(config.small_talk_max_words);
        Self {
            embedder,
            index,
            config,
            is_small_talk: Box::new(move |q: &str| filter.is_small_talk(q)),
        }
    }

    /// Replace the small-talk predicate.
    pub fn with_small_talk_predicate(
        mut self,
        predicate: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.is_small_talk = Box::new(predicate);
        self
    }

    /// Build grounding context for `query` from at most one chunk per article.
    pub async fn retrieve_context(
        &self,
        query: &str,
        max_chunks: usize,
        category: Option<&str>,
    ) -> Result<RetrievalResult, RetrievalError> {
        let hits = self.retrieve_chunks(query, max_chunks, category).await?;
        if hits.is_empty() {
            debug!(query, "no relevant chunks");
            return Ok(RetrievalResult::NoRelevantContext);
        }
        let retained = dedupe_by_document(hits);
        let context = format_context(&retained);
        info!(
            articles = retained.len(),
            chars = context.len(),
            "assembled retrieval context"
        );
        Ok(RetrievalResult::Context(context))
    }

    /// Scored chunks above the threshold, highest first, before deduplication.
    pub async fn retrieve_chunks(
        &self,
        query: &str,
        max_chunks: usize,
        category: Option<&str>,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        if (self.is_small_talk)(query) {
            debug!(query, "small talk; skipping retrieval");
            return Ok(Vec::new());
        }

        let query_embedding = match self.embedder.embed(query).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "query embedding failed; continuing without context");
                return Ok(Vec::new());
            }
        };
        if query_embedding.len() != self.embedder.dimension() {
            warn!(
                expected = self.embedder.dimension(),
                actual = query_embedding.len(),
                "query embedding has wrong dimension; continuing without context"
            );
            return Ok(Vec::new());
        }

        let top_k = max_chunks.max(self.config.default_max_chunks);
        let hits = match category.map(str::trim).filter(|c| !c.is_empty()) {
            Some(wanted) => {
                let wanted = wanted.to_lowercase();
                self.index.search_filtered(
                    &query_embedding,
                    top_k,
                    self.config.min_similarity,
                    &|c: &Chunk| {
                        c.category
                            .as_deref()
                            .is_some_and(|cat| cat.to_lowercase() == wanted)
                    },
                )?
            }
            None => self
                .index
                .search(&query_embedding, top_k, self.config.min_similarity)?,
        };
        debug!(top_k, hits = hits.len(), "index search finished");
        Ok(hits)
    }
}

/// Keeps the first (highest-scoring) chunk of each article, preserving order.
pub fn dedupe_by_document(hits: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|hit| {
            let fresh = seen.insert(hit.chunk.source_document_id);
            if !fresh {
                debug!(chunk_id = %hit.chunk.id, "skipping chunk from already included article");
            }
            fresh
        })
        .collect()
}

/// One block per chunk: title line, optional category line, content line, blank line.
pub fn format_context(hits: &[ScoredChunk]) -> String {
    let mut out = String::new();
    for hit in hits {
        let chunk = &hit.chunk;
        let _ = writeln!(out, "Article: {}", chunk.title);
        if let Some(category) = chunk.category.as_deref().filter(|c| !c.trim().is_empty()) {
            let _ = writeln!(out, "Category: {category}");
        }
        let _ = writeln!(out, "Content: {}", chunk.content);
        out.push('\n');
    }
    out
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("vector index error: {0}")]
    Store(#[from] StoreError),
}
