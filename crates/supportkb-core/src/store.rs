//! In-memory vector index for chunk embeddings. Supports upsert, removal by article and
//! thresholded cosine-similarity search.
//! No persistence; the index is rebuilt with `reindex_all` after a restart.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tracing::{error, trace};

use crate::chunks::{Chunk, DocumentId};

/// A search hit: the stored chunk and its cosine similarity to the query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Arc<Chunk>,
    pub similarity: f32,
}

/// Storage backend for embedded chunks.
///
/// Implementations take `&self` everywhere and must make each insert atomic, so a
/// concurrent search sees either the old chunk or the new one, never a mix.
pub trait VectorIndex: Send + Sync {
    /// Insert or overwrite by `chunk.id`.
    fn add(&self, chunk: Chunk) -> Result<(), StoreError>;

    /// Add every chunk. A failing chunk does not stop the others; the first error is
    /// returned once all chunks have been tried.
    fn add_all(&self, chunks: Vec<Chunk>) -> Result<(), StoreError> {
        let mut first_err = None;
        for chunk in chunks {
            if let Err(e) = self.add(chunk) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Delete every chunk of `document_id`. Returns how many were removed.
    fn remove_by_source_document(&self, document_id: DocumentId) -> usize;

    /// Top `top_k` chunks accepted by `filter` whose similarity is strictly above
    /// `min_similarity`, highest first.
    fn search_filtered(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        min_similarity: f32,
        filter: &(dyn Fn(&Chunk) -> bool + Sync),
    ) -> Result<Vec<ScoredChunk>, StoreError>;

    fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        min_similarity: f32,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        self.search_filtered(query_embedding, top_k, min_similarity, &|_: &Chunk| true)
    }

    /// Number of stored chunks, including ones without an embedding.
    fn count(&self) -> usize;

    fn clear(&self);
}

/// Process-wide in-memory index keyed by chunk id.
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    items: RwLock<HashMap<String, Arc<Chunk>>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VectorIndex for InMemoryVectorIndex {
    fn add(&self, chunk: Chunk) -> Result<(), StoreError> {
        if chunk.id.is_empty() {
            return Err(StoreError::EmptyChunkId);
        }
        let chunk = Arc::new(chunk);
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(chunk.id.clone(), chunk);
        Ok(())
    }

    fn remove_by_source_document(&self, document_id: DocumentId) -> usize {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        let before = items.len();
        items.retain(|_, c| c.source_document_id != document_id);
        before - items.len()
    }

    fn search_filtered(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        min_similarity: f32,
        filter: &(dyn Fn(&Chunk) -> bool + Sync),
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        if top_k == 0 || query_embedding.is_empty() {
            return Ok(Vec::new());
        }
        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);

        let mut scored = Vec::new();
        for chunk in items.values() {
            let Some(embedding) = chunk.embedding.as_deref() else {
                continue;
            };
            if embedding.len() != query_embedding.len() {
                error!(
                    chunk_id = %chunk.id,
                    stored = embedding.len(),
                    query = query_embedding.len(),
                    "embedding dimension mismatch; was the model changed without a reindex?"
                );
                return Err(StoreError::DimensionMismatch {
                    chunk_id: chunk.id.clone(),
                    expected: embedding.len(),
                    actual: query_embedding.len(),
                });
            }
            if !filter(chunk) {
                continue;
            }
            let similarity = cosine_similarity(query_embedding, embedding);
            if similarity > min_similarity {
                scored.push(ScoredChunk {
                    chunk: Arc::clone(chunk),
                    similarity,
                });
            } else {
                trace!(chunk_id = %chunk.id, similarity, min_similarity, "below threshold");
            }
        }
        drop(items);

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    fn count(&self) -> usize {
        self.items.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn clear(&self) {
        self.items.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// `dot(a, b) / (|a| * |b|)`, or 0 when either vector has zero norm.
/// Callers guarantee equal lengths; extra trailing components are ignored.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("chunk id must not be empty")]
    EmptyChunkId,
    #[error("embedding dimension mismatch for chunk {chunk_id}: stored {expected}, query {actual}")]
    DimensionMismatch {
        chunk_id: String,
        expected: usize,
        actual: usize,
    },
}
