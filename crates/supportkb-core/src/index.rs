//! Index lifecycle: chunk → embed → store, driven by article saves and deletes.
//!
//! Embedding failures are per chunk: the chunk is logged and skipped, the rest of the
//! article is still indexed.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::articles::Article;
use crate::chunks::{Chunker, DocumentId};
use crate::embedding::{EmbedError, Embedder};
use crate::store::{StoreError, VectorIndex};

/// Outcome of indexing one article.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub total_chunks: usize,
    pub indexed: usize,
    pub failed: usize,
}

/// Outcome of a full rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReindexReport {
    pub articles: usize,
    pub skipped_inactive: usize,
    pub failed_articles: usize,
    pub chunks_indexed: usize,
    pub chunks_failed: usize,
}

/// Keeps the vector index in step with the knowledge base.
pub struct KnowledgeIndexer {
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl KnowledgeIndexer {
    pub fn new(chunker: Chunker, embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            chunker,
            embedder,
            index,
        }
    }

    /// Replace the article's chunks with freshly embedded ones.
    pub async fn on_document_upserted(
        &self,
        document_id: DocumentId,
        title: &str,
        content: &str,
        category: Option<&str>,
    ) -> Result<IndexReport, IndexError> {
        let removed = self.index.remove_by_source_document(document_id);
        let chunks = self.chunker.chunk_article(document_id, title, content, category);
        let mut report = IndexReport {
            total_chunks: chunks.len(),
            ..IndexReport::default()
        };
        debug!(%document_id, removed, chunks = chunks.len(), "re-chunked article");

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embed_chunks(&texts).await;
        let dimension = self.embedder.dimension();
        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            match embedding {
                Ok(embedding) if embedding.len() == dimension => {
                    self.index.add(chunk.with_embedding(embedding))?;
                    report.indexed += 1;
                }
                Ok(embedding) => {
                    warn!(
                        %document_id,
                        chunk_id = %chunk.id,
                        expected = dimension,
                        actual = embedding.len(),
                        "skipping chunk: embedding has wrong dimension"
                    );
                    report.failed += 1;
                }
                Err(e) => {
                    warn!(%document_id, chunk_id = %chunk.id, error = %e, "skipping chunk: embedding failed");
                    report.failed += 1;
                }
            }
        }
        info!(
            %document_id,
            title,
            indexed = report.indexed,
            failed = report.failed,
            "indexed article"
        );
        Ok(report)
    }

    /// One result per text, in order. Tries a single batch first; if the batch fails,
    /// each text is embedded on its own so one bad chunk does not sink the article.
    async fn embed_chunks(&self, texts: &[String]) -> Vec<Result<Vec<f32>, EmbedError>> {
        match self.embedder.embed_batch(texts).await {
            Ok(vectors) if vectors.len() == texts.len() => {
                return vectors.into_iter().map(Ok).collect();
            }
            Ok(vectors) => debug!(
                expected = texts.len(),
                actual = vectors.len(),
                "batch embedding incomplete; retrying per chunk"
            ),
            Err(e) => debug!(error = %e, "batch embedding failed; retrying per chunk"),
        }
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embedder.embed(text).await);
        }
        out
    }

    /// Upsert an active article; an inactive one is removed instead.
    pub async fn index_article(&self, article: &Article) -> Result<IndexReport, IndexError> {
        if !article.active {
            self.on_document_deactivated_or_deleted(article.id);
            return Ok(IndexReport::default());
        }
        self.on_document_upserted(
            article.id,
            &article.title,
            &article.content,
            article.category.as_deref(),
        )
        .await
    }

    /// Returns how many chunks were removed.
    pub fn on_document_deactivated_or_deleted(&self, document_id: DocumentId) -> usize {
        let removed = self.index.remove_by_source_document(document_id);
        info!(%document_id, removed, "removed article from index");
        removed
    }

    /// Clear the index and index every active article.
    ///
    /// Searches running concurrently may see a partially rebuilt index.
    pub async fn reindex_all(&self, articles: &[Article]) -> ReindexReport {
        info!(articles = articles.len(), "reindexing knowledge base");
        self.index.clear();
        let mut report = ReindexReport::default();
        for article in articles {
            if !article.active {
                report.skipped_inactive += 1;
                continue;
            }
            match self.index_article(article).await {
                Ok(r) => {
                    report.articles += 1;
                    report.chunks_indexed += r.indexed;
                    report.chunks_failed += r.failed;
                }
                Err(e) => {
                    warn!(document_id = %article.id, error = %e, "failed to index article");
                    report.failed_articles += 1;
                }
            }
        }
        info!(
            articles = report.articles,
            chunks = self.index.count(),
            failed_chunks = report.chunks_failed,
            "reindex complete"
        );
        report
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("vector index error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryVectorIndex;
    use crate::test_support::KeywordEmbedder;

    fn indexer(embedder: KeywordEmbedder) -> (KnowledgeIndexer, Arc<InMemoryVectorIndex>) {
        let index = Arc::new(InMemoryVectorIndex::new());
        let indexer = KnowledgeIndexer::new(Chunker::new(40, 10), Arc::new(embedder), index.clone());
        (indexer, index)
    }

    fn article(id: i64, title: &str, content: &str, active: bool) -> Article {
        Article {
            id: DocumentId(id),
            title: title.into(),
            content: content.into(),
            category: Some("General".into()),
            active,
        }
    }

    #[tokio::test]
    async fn upsert_embeds_and_stores_every_chunk() {
        let (indexer, index) = indexer(KeywordEmbedder::new(&["refund", "ship"]));
        let report = indexer
            .on_document_upserted(
                DocumentId(1),
                "Refund Policy",
                "Refunds are issued in thirty days. Refund requests need an order number.",
                Some("Billing"),
            )
            .await
            .unwrap();
        assert!(report.total_chunks > 1);
        assert_eq!(report.indexed, report.total_chunks);
        assert_eq!(index.count(), report.total_chunks);

        let hits = index.search(&[1.0, 0.0], 10, 0.5).unwrap();
        assert!(hits.iter().all(|h| h.chunk.category.as_deref() == Some("Billing")));
        assert!(hits.iter().all(|h| h.chunk.embedding.is_some()));
    }

    #[tokio::test]
    async fn upsert_replaces_previous_chunks() {
        let (indexer, index) = indexer(KeywordEmbedder::new(&["refund"]));
        let long = "refund ".repeat(30);
        indexer.on_document_upserted(DocumentId(1), "A", &long, None).await.unwrap();
        let before = index.count();
        assert!(before > 1);

        indexer.on_document_upserted(DocumentId(1), "A", "short refund", None).await.unwrap();
        assert_eq!(index.count(), 1);
        let hits = index.search(&[1.0], 10, 0.0).unwrap();
        assert_eq!(hits[0].chunk.content, "short refund");
        assert_eq!(hits[0].chunk.id, "1_chunk_0");
    }

    #[tokio::test]
    async fn failed_chunks_are_skipped() {
        let (indexer, index) = indexer(KeywordEmbedder::new(&["refund"]).failing_on("broken"));
        let report = indexer
            .on_document_upserted(
                DocumentId(2),
                "Mixed",
                "refund one refund two refund three. broken broken broken broken broken. refund four refund five",
                None,
            )
            .await
            .unwrap();
        assert!(report.failed >= 1);
        assert!(report.indexed >= 1);
        assert_eq!(report.indexed + report.failed, report.total_chunks);
        assert_eq!(index.count(), report.indexed);
    }

    #[tokio::test]
    async fn wrong_dimension_embeddings_are_skipped() {
        let (indexer, index) = indexer(KeywordEmbedder::new(&["refund", "ship"]).claiming_dimension(3));
        let report = indexer
            .on_document_upserted(
                DocumentId(4),
                "Refund Policy",
                "Refunds are issued in thirty days. Refund requests need an order number.",
                None,
            )
            .await
            .unwrap();
        assert!(report.total_chunks > 1);
        assert_eq!(report.indexed, 0);
        assert_eq!(report.failed, report.total_chunks);
        assert_eq!(index.count(), 0);
    }

    #[tokio::test]
    async fn deactivation_removes_chunks() {
        let (indexer, index) = indexer(KeywordEmbedder::new(&["ship"]));
        indexer.index_article(&article(5, "Shipping", "ship ship ship", true)).await.unwrap();
        indexer.index_article(&article(7, "More", "ship", true)).await.unwrap();
        assert_eq!(index.count(), 2);

        indexer.index_article(&article(5, "Shipping", "ship ship ship", false)).await.unwrap();
        assert_eq!(index.count(), 1);
        assert_eq!(indexer.on_document_deactivated_or_deleted(DocumentId(7)), 1);
        assert_eq!(indexer.on_document_deactivated_or_deleted(DocumentId(7)), 0);
        assert_eq!(index.count(), 0);
    }

    #[tokio::test]
    async fn reindex_all_rebuilds_from_active_articles() {
        let (indexer, index) = indexer(KeywordEmbedder::new(&["ship"]));
        indexer.index_article(&article(99, "Stale", "ship stale", true)).await.unwrap();

        let report = indexer
            .reindex_all(&[
                article(1, "One", "ship one", true),
                article(2, "Two", "ship two", false),
                article(3, "Three", "ship three", true),
            ])
            .await;
        assert_eq!(report.articles, 2);
        assert_eq!(report.skipped_inactive, 1);
        assert_eq!(report.chunks_indexed, 2);
        assert_eq!(index.count(), 2);
        let hits = index.search(&[1.0], 10, 0.0).unwrap();
        assert!(hits.iter().all(|h| h.chunk.source_document_id != DocumentId(99)));
        assert!(hits.iter().all(|h| h.chunk.source_document_id != DocumentId(2)));
    }

    #[tokio::test]
    async fn empty_article_indexes_nothing() {
        let (indexer, index) = indexer(KeywordEmbedder::new(&["x"]));
        let report = indexer.on_document_upserted(DocumentId(1), "Empty", "<p> </p>", None).await.unwrap();
        assert_eq!(report, IndexReport::default());
        assert_eq!(index.count(), 0);
    }
}
