//! CLI entry point for the support knowledge base (for dev and testing).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use supportkb_core::{
    app_data_dir, load_config, read_article, scan_articles, set_knowledge_root,
    watch_articles, Config, InMemoryVectorIndex, KnowledgeIndexer, OllamaEmbedder,
    RetrievalPipeline, RetrievalResult,
};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

#[derive(Parser)]
#[command(name = "supportkb")]
#[command(about = "supportkb: knowledge-base retrieval for the support assistant")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show backend status and effective config.
    Status,
    /// Show where supportkb stores its config (app data directory).
    DataDir,
    /// Remember the knowledge folder in the config file.
    SetRoot {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Scan a folder for articles and list them.
    Scan {
        /// Knowledge folder to scan.
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Print the chunks one article file is split into.
    Chunk {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Print chunks as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Index the knowledge folder, then retrieve context for a query.
    Query {
        query: String,
        /// Knowledge folder (defaults to the configured one).
        #[arg(long, value_name = "PATH")]
        root: Option<PathBuf>,
        #[arg(long, default_value_t = 3)]
        max_chunks: usize,
        #[arg(long)]
        category: Option<String>,
        /// Print scored chunks instead of the context string.
        #[arg(long)]
        chunks: bool,
    },
    /// Index the knowledge folder and reindex whenever it changes.
    Watch {
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "supportkb=info,supportkb_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = load_config();

    match cli.command.unwrap_or(Commands::Status) {
        Commands::Status => {
            println!("supportkb backend");
            println!("  core: supportkb-core {}", supportkb_core::VERSION);
            println!("  knowledge root: {}", display_root(config.knowledge_root().as_deref()));
            println!(
                "  model: {} ({} dims) at {}",
                config.ollama.embed_model, config.ollama.embedding_dimension, config.ollama.base_url
            );
            println!(
                "  chunking: {} chars, {} overlap",
                config.chunking.chunk_size, config.chunking.chunk_overlap
            );
            println!(
                "  retrieval: similarity > {}, at least {} chunks",
                config.retrieval.min_similarity, config.retrieval.default_max_chunks
            );
        }
        Commands::DataDir => match app_data_dir() {
            Some(p) => println!("{}", p.display()),
            None => eprintln!("Could not determine app data directory."),
        },
        Commands::SetRoot { path } => {
            set_knowledge_root(&path)?;
            println!("Knowledge root set to {}", path.display());
        }
        Commands::Scan { path } => {
            let articles = scan_articles(&path)?;
            println!("Scanned {} article(s) under {}", articles.len(), path.display());
            for a in articles {
                let state = if a.active { "" } else { " (inactive)" };
                let category = a.category.as_deref().unwrap_or("-");
                println!("  [{}] {}  [{}]{}", a.id, a.title, category, state);
            }
        }
        Commands::Chunk { file, json } => {
            let article = read_article(&file)?;
            let chunks = config.chunking.chunker().chunk_article(
                article.id,
                &article.title,
                &article.content,
                article.category.as_deref(),
            );
            if json {
                println!("{}", serde_json::to_string_pretty(&chunks)?);
            } else {
                for c in chunks {
                    println!("--- {} ({}/{}, {} chars)", c.id, c.chunk_index + 1, c.total_chunks, c.content.chars().count());
                    println!("{}", c.content);
                }
            }
        }
        Commands::Query {
            query,
            root,
            max_chunks,
            category,
            chunks,
        } => {
            let root = resolve_root(root, &config)?;
            let (indexer, pipeline) = build(&config)?;
            startup_reindex(&indexer, &root).await;

            if chunks {
                let hits = pipeline
                    .retrieve_chunks(&query, max_chunks, category.as_deref())
                    .await?;
                if hits.is_empty() {
                    println!("No relevant chunks.");
                }
                for h in hits {
                    println!("{:.4}  {}  {}", h.similarity, h.chunk.id, h.chunk.title);
                }
            } else {
                match pipeline
                    .retrieve_context(&query, max_chunks, category.as_deref())
                    .await?
                {
                    RetrievalResult::Context(context) => print!("{context}"),
                    RetrievalResult::NoRelevantContext => println!("No relevant context."),
                }
            }
        }
        Commands::Watch { path } => {
            let root = resolve_root(path, &config)?;
            let (indexer, _) = build(&config)?;
            let indexer = Arc::new(indexer);
            startup_reindex(&indexer, &root).await;

            println!("Watching {} (Ctrl+C to stop)", root.display());
            let handle = tokio::runtime::Handle::current();
            tokio::task::spawn_blocking(move || {
                watch_articles(&root, move |scan| match scan {
                    Ok(articles) => {
                        let report = handle.block_on(indexer.reindex_all(&articles));
                        println!(
                            "Reindexed {} article(s), {} chunk(s)",
                            report.articles, report.chunks_indexed
                        );
                    }
                    Err(e) => eprintln!("Scan error: {e}"),
                })
            })
            .await??;
        }
    }
    Ok(())
}

fn build(config: &Config) -> Result<(KnowledgeIndexer, RetrievalPipeline)> {
    let embedder = Arc::new(OllamaEmbedder::from_config(&config.ollama)?);
    let index = Arc::new(InMemoryVectorIndex::new());
    let indexer = KnowledgeIndexer::new(config.chunking.chunker(), embedder.clone(), index.clone());
    let pipeline = RetrievalPipeline::new(embedder, index, config.retrieval);
    Ok((indexer, pipeline))
}

/// Blocks until the index is rebuilt. A failed scan leaves the index empty and is
/// reported, not fatal: queries then answer with no context.
async fn startup_reindex(indexer: &KnowledgeIndexer, root: &Path) {
    match scan_articles(root) {
        Ok(articles) => {
            let report = indexer.reindex_all(&articles).await;
            if report.chunks_failed > 0 || report.failed_articles > 0 {
                tracing::warn!(
                    failed_chunks = report.chunks_failed,
                    failed_articles = report.failed_articles,
                    "index is incomplete"
                );
            }
        }
        Err(e) => tracing::error!(error = %e, "could not load articles; serving without knowledge base"),
    }
}

fn resolve_root(arg: Option<PathBuf>, config: &Config) -> Result<PathBuf> {
    arg.or_else(|| config.knowledge_root())
        .context("no knowledge folder given and none configured (see `supportkb set-root`)")
}

fn display_root(root: Option<&Path>) -> String {
    root.map(|p| p.display().to_string())
        .unwrap_or_else(|| "(not set)".to_string())
}
