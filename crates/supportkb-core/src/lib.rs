//! Knowledge retrieval for the support assistant, independent of how it is run.
//!
//! Articles are split into overlapping chunks, embedded through an [`Embedder`], held in
//! an in-memory [`VectorIndex`], and turned into prompt context by [`RetrievalPipeline`].
//! Nothing is persisted except config (see [app_data]); the index is rebuilt with
//! [`KnowledgeIndexer::reindex_all`] at startup.

pub mod app_data;
pub mod articles;
pub mod chunks;
pub mod config;
pub mod embedding;
pub mod index;
pub mod ollama;
pub mod retrieval;
pub mod small_talk;
pub mod store;
pub mod watcher;

#[cfg(test)]
pub(crate) mod test_support;

pub use app_data::app_data_dir;
pub use articles::{read_article, scan_articles, Article, ScanError};
pub use chunks::{chunk_text, normalize_text, Chunk, Chunker, DocumentId};
pub use config::{
    get_knowledge_root, load_config, load_config_from, save_config, set_knowledge_root, Config,
    ConfigError,
};
pub use embedding::{EmbedError, Embedder};
pub use index::{IndexError, IndexReport, KnowledgeIndexer, ReindexReport};
pub use ollama::OllamaEmbedder;
pub use retrieval::{RetrievalError, RetrievalPipeline, RetrievalResult};
pub use small_talk::SmallTalkFilter;
pub use store::{cosine_similarity, InMemoryVectorIndex, ScoredChunk, StoreError, VectorIndex};
pub use watcher::{watch_articles, WatchError};

/// Version of this crate, as reported by `supportkb status`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
