use serde::{Deserialize, Serialize};

use crate::types::Chunk;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_percent: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_tokens: 500, overlap_percent: 0.2 }
    }
}

/// Splits a source text into paragraph chunks; paragraphs over `max_tokens`
/// are cut into overlapping word windows.
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    pub fn chunk(&self, corpus: &str, text: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for (offset, paragraph) in paragraphs(text) {
            if count_tokens(paragraph) <= self.config.max_tokens {
                chunks.push(make_chunk(corpus, chunks.len(), offset, paragraph.to_string()));
                continue;
            }
            for (window_offset, window) in self.split_with_overlap(text, paragraph) {
                chunks.push(make_chunk(corpus, chunks.len(), window_offset, window));
            }
        }
        chunks
    }

    fn words_per_chunk(&self) -> usize {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let words = (self.config.max_tokens as f32 * 0.75) as usize;
        words.max(1)
    }

    fn split_with_overlap(&self, text: &str, paragraph: &str) -> Vec<(usize, String)> {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        let words_per_chunk = self.words_per_chunk();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let overlap_words = ((words_per_chunk as f32 * self.config.overlap_percent) as usize).min(words_per_chunk - 1);
        let mut windows = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let end = (start + words_per_chunk).min(words.len());
            windows.push((offset_in(text, words[start]), words[start..end].join(" ")));
            if end >= words.len() {
                break;
            }
            start = end - overlap_words;
        }
        windows
    }
}

/// Token estimate: four tokens per three words.
pub fn count_tokens(text: &str) -> usize {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let tokens = (text.split_whitespace().count() as f32 / 0.75) as usize;
    tokens
}

fn make_chunk(corpus: &str, index: usize, source_offset: usize, text: String) -> Chunk {
    Chunk {
        chunk_id: chunk_id(index, source_offset, &text),
        corpus_name: corpus.to_string(),
        index,
        source_offset,
        text,
        context: None,
    }
}

/// Ids change whenever position or content change, so re-chunking never reuses an id
/// for different text.
pub fn chunk_id(index: usize, source_offset: usize, text: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(index as u64).to_le_bytes());
    hasher.update(&(source_offset as u64).to_le_bytes());
    hasher.update(text.as_bytes());
    let hex = hasher.finalize().to_hex();
    hex[..16].to_string()
}

/// The chunk plus up to `radius` bytes of source on either side, cut at char boundaries.
pub fn surrounding_text<'a>(source: &'a str, chunk: &Chunk, radius: usize) -> &'a str {
    let start = floor_char_boundary(source, chunk.source_offset.saturating_sub(radius));
    let end = ceil_char_boundary(source, chunk.source_offset.saturating_add(chunk.text.len()).saturating_add(radius));
    &source[start..end]
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(s: &str, mut i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

/// Byte offset of `part` inside `whole`; `part` must be a subslice of `whole`.
fn offset_in(whole: &str, part: &str) -> usize {
    (part.as_ptr() as usize).saturating_sub(whole.as_ptr() as usize)
}

/// Paragraphs separated by blank lines, trimmed, with their byte offsets.
fn paragraphs(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    let mut end = 0;
    let mut pos = 0;
    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() {
            if let Some(s) = start.take() {
                out.push(&text[s..end]);
            }
        } else {
            if start.is_none() {
                start = Some(pos);
            }
            end = pos + line.len();
        }
        pos += line.len();
    }
    if let Some(s) = start {
        out.push(&text[s..end]);
    }
    out.into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| (offset_in(text, p), p))
        .collect()
}
