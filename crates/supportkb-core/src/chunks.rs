//! Splits article bodies into overlapping chunks for embedding and search.
//! Markup is stripped and whitespace collapsed first; cuts prefer the last space
//! inside the window and fall back to a hard cut.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default maximum characters per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 500;
/// Default characters shared between neighbouring chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Identifier of a knowledge-base article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub i64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for DocumentId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A chunk of an article, with the article's display metadata and (once embedded) its vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// `"{document_id}_chunk_{index}"`; stable across re-indexing.
    pub id: String,
    pub source_document_id: DocumentId,
    pub title: String,
    pub content: String,
    /// Index of this chunk within the article (0, 1, 2, …).
    pub chunk_index: usize,
    pub total_chunks: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Chunk {
    /// Returns the chunk with `embedding` attached.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// Builds the id of the `index`-th chunk of `document_id`.
pub fn chunk_id(document_id: DocumentId, index: usize) -> String {
    format!("{document_id}_chunk_{index}")
}

/// Chunking parameters. Sizes are counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl Chunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }

    /// Split `text` into chunk contents. See [`chunk_text`].
    pub fn chunk(&self, text: &str) -> Vec<String> {
        chunk_text(text, self.chunk_size, self.overlap)
    }

    /// Chunk an article body and wrap each piece with its id and position.
    pub fn chunk_article(
        &self,
        document_id: DocumentId,
        title: &str,
        content: &str,
        category: Option<&str>,
    ) -> Vec<Chunk> {
        let pieces = self.chunk(content);
        let total = pieces.len();
        pieces
            .into_iter()
            .enumerate()
            .map(|(i, content)| Chunk {
                id: chunk_id(document_id, i),
                source_document_id: document_id,
                title: title.to_string(),
                content,
                chunk_index: i,
                total_chunks: total,
                embedding: None,
                category: category.map(str::to_string),
            })
            .collect()
    }
}

/// Strips markup tags, collapses whitespace runs to one space and trims.
pub fn normalize_text(text: &str) -> String {
    let stripped = TAG_RE.replace_all(text, " ");
    WS_RE.replace_all(&stripped, " ").trim().to_string()
}

/// Splits `text` into windows of at most `chunk_size` characters, each starting
/// `overlap` characters before the previous one ended.
///
/// Empty input yields no chunks; input that fits in one window yields exactly one.
/// The window start always moves forward, so any `overlap` terminates.
/// A `chunk_size` of 0 disables splitting: the whole normalized text is one chunk.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let clean = normalize_text(text);
    if clean.is_empty() {
        return Vec::new();
    }
    let chars: Vec<char> = clean.chars().collect();
    let len = chars.len();
    if len <= chunk_size || chunk_size == 0 {
        return vec![clean];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < len {
        let mut end = (start + chunk_size).min(len);
        if end < len {
            if let Some(space) = last_space_at_or_before(&chars, end) {
                if space > start {
                    end = space;
                }
            }
        }

        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        if end >= len {
            break;
        }
        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }
    chunks
}

fn last_space_at_or_before(chars: &[char], pos: usize) -> Option<usize> {
    let upto = pos.min(chars.len() - 1);
    chars[..=upto].iter().rposition(|&c| c == ' ')
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    /// `"w0 w1 w2 …"` with as many words as fit in `chars` characters; every word
    /// occurs once.
    fn numbered_words(chars: usize) -> String {
        let mut out = String::new();
        for i in 0.. {
            let word = format!("w{i}");
            let sep = usize::from(!out.is_empty());
            if out.len() + sep + word.len() > chars {
                break;
            }
            if sep == 1 {
                out.push(' ');
            }
            out.push_str(&word);
        }
        out
    }

    /// Length of the longest suffix of `a` that is also a prefix of `b`.
    fn shared_len(a: &str, b: &str) -> usize {
        (1..=a.len().min(b.len()))
            .rev()
            .find(|&k| a.ends_with(&b[..k]))
            .unwrap_or(0)
    }

    fn prose(chars: usize) -> String {
        let words = [
            "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed",
            "do", "eiusmod", "tempor",
        ];
        let mut out = String::new();
        let mut i = 0;
        while out.len() < chars {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(words[i % words.len()]);
            i += 1;
        }
        out.truncate(chars);
        out.trim_end().to_string()
    }

    #[test]
    fn short_text_is_one_chunk() {
        let c = chunk_text("One   paragraph.\n\nStill short.", 500, 100);
        assert_eq!(c, vec!["One paragraph. Still short.".to_string()]);
    }

    #[test]
    fn empty_and_blank_text_yield_nothing() {
        assert!(chunk_text("", 500, 100).is_empty());
        assert!(chunk_text("   \n\t ", 500, 100).is_empty());
        assert!(chunk_text("<p></p>", 500, 100).is_empty());
    }

    #[test]
    fn strips_markup() {
        assert_eq!(
            normalize_text("<h1>Refunds</h1><p>Within <b>30</b> days.</p>"),
            "Refunds Within 30 days."
        );
    }

    #[test]
    fn twelve_hundred_chars_make_three_overlapping_chunks() {
        let text = numbered_words(1200);
        assert!(text.len() > 1190);
        let c = chunk_text(&text, 500, 100);
        assert_eq!(c.len(), 3);
        assert!(c.iter().all(|s| s.chars().count() <= 500));
        for pair in c.windows(2) {
            let shared = shared_len(&pair[0], &pair[1]);
            assert!((99..=110).contains(&shared), "overlap of {shared} chars");
        }
    }

    #[test]
    fn chunks_end_on_word_boundaries() {
        let text = prose(1200);
        let words: Vec<&str> = text.split(' ').collect();
        for c in chunk_text(&text, 500, 100) {
            let last = c.split(' ').last().unwrap_or_default();
            assert!(words.contains(&last), "cut mid-word: {last}");
        }
    }

    #[test]
    fn every_word_is_covered_and_neighbours_overlap() {
        let text = numbered_words(1500);
        let total_words = text.split(' ').count();
        for (size, overlap) in [(50, 0), (50, 10), (50, 49), (50, 50), (50, 80), (20, 5), (500, 100)] {
            let chunks = chunk_text(&text, size, overlap);
            assert!(chunks.iter().all(|c| c.chars().count() <= size), "({size}, {overlap})");

            let tokens: HashSet<&str> = chunks.iter().flat_map(|c| c.split(' ')).collect();
            for i in 0..total_words {
                assert!(tokens.contains(format!("w{i}").as_str()), "w{i} lost at ({size}, {overlap})");
            }

            let mut from = 0;
            let mut prev_end = 0;
            for (n, chunk) in chunks.iter().enumerate() {
                let start = from + text[from..].find(chunk.as_str()).expect("chunk is a slice of the text");
                if n == 0 {
                    assert_eq!(start, 0);
                } else {
                    let gap_is_one_space = start == prev_end + 1 && text.as_bytes()[prev_end] == b' ';
                    assert!(start <= prev_end || gap_is_one_space, "hole before chunk {n} at ({size}, {overlap})");
                }
                if n > 0 && overlap > 0 && overlap * 2 <= size {
                    assert!(shared_len(&chunks[n - 1], chunk) >= overlap - 1, "({size}, {overlap})");
                }
                from = start + 1;
                prev_end = start + chunk.len();
            }
            assert_eq!(prev_end, text.len());
        }
    }

    #[test]
    fn zero_chunk_size_returns_whole_text() {
        let text = numbered_words(300);
        assert_eq!(chunk_text(&text, 0, 10), vec![text.clone()]);
        assert_eq!(chunk_text(&text, 0, 0), vec![text]);
    }

    #[test]
    fn degenerate_overlap_terminates() {
        let text = prose(1000);
        for overlap in [200, 201, 500, 10_000] {
            let c = chunk_text(&text, 200, overlap);
            assert!(!c.is_empty());
            assert!(c.len() <= 1000);
        }
    }

    #[test]
    fn hard_cut_without_spaces() {
        let text = "a".repeat(600);
        let c = chunk_text(&text, 200, 0);
        assert_eq!(c.len(), 3);
        assert!(c.iter().all(|s| s.len() == 200));
    }

    #[test]
    fn multibyte_text_is_cut_on_characters() {
        let text = "é".repeat(450);
        let c = chunk_text(&text, 200, 20);
        assert!(c.iter().all(|s| s.chars().count() <= 200));
        assert_eq!(c.first().map(|s| s.chars().count()), Some(200));
    }

    #[test]
    fn chunk_article_assigns_ids_and_positions() {
        let chunker = Chunker::new(200, 50);
        let chunks = chunker.chunk_article(DocumentId(42), "Shipping Times", &prose(700), Some("Orders"));
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.id, format!("42_chunk_{i}"));
            assert_eq!(c.chunk_index, i);
            assert_eq!(c.total_chunks, chunks.len());
            assert_eq!(c.title, "Shipping Times");
            assert_eq!(c.category.as_deref(), Some("Orders"));
            assert!(c.embedding.is_none());
        }
    }
}
