//! Document chunking.
//!
//! Two strategies, selected per source by the operator:
//! - `Sentence`: sentences are packed greedily into chunks of at most
//!   `max_len` characters.
//! - `Title`: the text is cut at uppercase heading lines; chunks can be large.
//!
//! Both drop near-empty fragments (page-break debris, lone headers) through a
//! minimum trimmed length.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::types::{Chunk, ChunkStrategy};

/// Sentence end: terminal punctuation followed by a whitespace run.
static SENTENCE_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]\s+").expect("sentence boundary pattern"));

/// A heading line standing alone between two newlines.
static HEADING_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[A-ZÁÉÍÓÚÜÑ ]{5,}\n").expect("heading pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingOptions {
    /// Character budget of a sentence chunk.
    pub max_len: usize,
    /// Sentence chunks must be strictly longer than this once trimmed.
    pub sentence_min_len: usize,
    /// Title segments must be strictly longer than this once trimmed.
    pub title_min_len: usize,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self { max_len: 500, sentence_min_len: 30, title_min_len: 50 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Chunker {
    options: ChunkingOptions,
}

impl Chunker {
    pub fn new(options: ChunkingOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ChunkingOptions {
        &self.options
    }

    /// Splits `text` into ordered chunk texts.
    pub fn chunk(&self, text: &str, strategy: ChunkStrategy) -> Vec<String> {
        match strategy {
            ChunkStrategy::Sentence => {
                split_by_sentences(text, self.options.max_len, self.options.sentence_min_len)
            }
            ChunkStrategy::Title => split_by_titles(text, self.options.title_min_len),
        }
    }

    /// Chunks a whole document and numbers the result in reading order.
    pub fn chunk_document(&self, source_id: &str, text: &str, strategy: ChunkStrategy) -> Vec<Chunk> {
        self.chunk(text, strategy)
            .into_iter()
            .enumerate()
            .map(|(ordinal, text)| Chunk { text, source_id: source_id.to_string(), ordinal })
            .collect()
    }
}

/// Cuts after every `.`/`!`/`?` that is followed by whitespace. The
/// punctuation stays with its sentence; the whitespace is consumed.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in SENTENCE_BOUNDARY.find_iter(text) {
        // punctuation is a single ASCII byte
        let end = m.start() + 1;
        sentences.push(&text[start..end]);
        start = m.end();
    }
    sentences.push(&text[start..]);
    sentences
}

pub fn split_by_sentences(text: &str, max_len: usize, min_len: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_chars = 0usize;

    for sentence in split_sentences(text) {
        let sentence_chars = sentence.chars().count();
        if buffer_chars + sentence_chars <= max_len {
            buffer.push_str(sentence);
            buffer.push(' ');
            buffer_chars += sentence_chars + 1;
        } else {
            let closed = buffer.trim();
            if !closed.is_empty() {
                chunks.push(closed.to_string());
            }
            buffer = format!("{sentence} ");
            buffer_chars = sentence_chars + 1;
        }
    }

    let tail = buffer.trim();
    if !tail.is_empty() {
        chunks.push(tail.to_string());
    }

    chunks.retain(|c| c.chars().count() > min_len);
    chunks
}

pub fn split_by_titles(text: &str, min_len: usize) -> Vec<String> {
    HEADING_LINE
        .split(text)
        .map(str::trim)
        .filter(|segment| segment.chars().count() > min_len)
        .map(str::to_string)
        .collect()
}
