//! Loading knowledge-base articles from a folder.
//!
//! `.md` files carry their metadata in YAML frontmatter (`id` is required; `title`
//! defaults to the file stem). `.json` files hold one article or an array of them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::chunks::DocumentId;

/// A knowledge-base article as the indexing lifecycle sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: DocumentId,
    pub title: String,
    /// Body; may contain HTML, which chunking strips.
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct Frontmatter {
    id: DocumentId,
    title: Option<String>,
    category: Option<String>,
    #[serde(default = "default_active")]
    active: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonArticles {
    Many(Vec<Article>),
    One(Article),
}

/// Scans `root` for `.md` and `.json` article files, sorted by path.
/// Does not follow symlinks into directories (walkdir default).
pub fn scan_articles(root: &Path) -> Result<Vec<Article>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }
    let mut articles = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = entry.map_err(|e| ScanError::Walk(e.to_string()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some("md") => articles.push(read_markdown(path)?),
            Some("json") => articles.extend(read_json(path)?),
            _ => {}
        }
    }
    Ok(articles)
}

/// Reads one article file (`.md` or `.json`; a JSON array yields its first article).
pub fn read_article(path: &Path) -> Result<Article, ScanError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => read_json(path)?
            .into_iter()
            .next()
            .ok_or_else(|| ScanError::Empty(path.to_path_buf())),
        _ => read_markdown(path),
    }
}

fn read_markdown(path: &Path) -> Result<Article, ScanError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ScanError::Read(path.to_path_buf(), e))?;
    let (yaml, body) = split_frontmatter(&raw);
    let yaml = yaml.ok_or_else(|| ScanError::MissingFrontmatter(path.to_path_buf()))?;
    let meta: Frontmatter =
        serde_yaml::from_str(yaml).map_err(|e| ScanError::Frontmatter(path.to_path_buf(), e))?;
    let title = meta.title.unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    Ok(Article {
        id: meta.id,
        title,
        content: body.to_string(),
        category: meta.category,
        active: meta.active,
    })
}

fn read_json(path: &Path) -> Result<Vec<Article>, ScanError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ScanError::Read(path.to_path_buf(), e))?;
    let parsed: JsonArticles =
        serde_json::from_str(&raw).map_err(|e| ScanError::Json(path.to_path_buf(), e))?;
    Ok(match parsed {
        JsonArticles::Many(v) => v,
        JsonArticles::One(a) => vec![a],
    })
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}

/// Splits optional YAML frontmatter (between the first `---` and the next `---` line)
/// from the body.
fn split_frontmatter(content: &str) -> (Option<&str>, &str) {
    let s = content.trim_start();
    let Some(after_first) = s.strip_prefix("---") else {
        return (None, content);
    };
    match after_first.find("\n---") {
        Some(end) => {
            let rest = &after_first[end + 4..];
            let body = rest.split_once('\n').map_or("", |(_, b)| b);
            (Some(&after_first[..end]), body.trim_start())
        }
        None => (None, content),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("walk error: {0}")]
    Walk(String),
    #[error("read error for {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("{0} has no frontmatter with an article id")]
    MissingFrontmatter(PathBuf),
    #[error("invalid frontmatter in {0}: {1}")]
    Frontmatter(PathBuf, serde_yaml::Error),
    #[error("invalid article JSON in {0}: {1}")]
    Json(PathBuf, serde_json::Error),
    #[error("no article in {0}")]
    Empty(PathBuf),
}
