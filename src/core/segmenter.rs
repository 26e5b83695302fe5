//! Text segmentation for chunked streaming.
//!
//! A sentence ends at `.`, `!` or `?` followed by whitespace and an uppercase
//! letter. Sentences are packed greedily into chunks bounded by character count
//! and sentence count. Both bounds are soft for a single sentence: a sentence
//! longer than `max_chars` becomes its own chunk and is never split.

use serde::Serialize;
use tracing::debug;

/// Default maximum characters per streamed chunk
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 150;
/// Default maximum sentences per streamed chunk
pub const DEFAULT_MAX_CHUNK_SENTENCES: usize = 3;

const PREVIEW_CHARS: usize = 50;
const CHARS_PER_SECOND: f64 = 25.0;
const MIN_ESTIMATE_SECS: f64 = 2.0;

/// Split `text` into sentences.
///
/// Returned sentences are trimmed and non-empty.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let text = text.trim();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if !matches!(ch, '.' | '!' | '?') {
            continue;
        }

        let end = idx + ch.len_utf8();
        let mut saw_whitespace = false;
        let mut next_start = None;
        for (offset, c) in text[end..].char_indices() {
            if c.is_whitespace() {
                saw_whitespace = true;
                continue;
            }
            if saw_whitespace && c.is_uppercase() {
                next_start = Some(end + offset);
            }
            break;
        }

        if let Some(next) = next_start {
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = next;
            // Resume scanning at the first letter of the next sentence
            while chars.peek().is_some_and(|(i, _)| *i < next) {
                chars.next();
            }
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Split `text` into ordered, non-empty chunks of whole sentences.
///
/// A chunk is closed when appending the next sentence would exceed
/// `max_chars` characters or when it already holds `max_sentences`
/// sentences. Empty or whitespace-only input yields no chunks.
pub fn split(text: &str, max_chars: usize, max_sentences: usize) -> Vec<String> {
    let max_sentences = max_sentences.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;
    let mut sentence_count = 0usize;

    for sentence in split_sentences(text) {
        let sentence_chars = sentence.chars().count();
        let joined_chars = if current.is_empty() {
            sentence_chars
        } else {
            current_chars + 1 + sentence_chars
        };

        if joined_chars > max_chars || sentence_count >= max_sentences {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            current.push_str(sentence);
            current_chars = sentence_chars;
            sentence_count = 1;
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(sentence);
            current_chars = joined_chars;
            sentence_count += 1;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    if !chunks.is_empty() {
        let total: usize = chunks.iter().map(|c| c.chars().count()).sum();
        debug!(
            chunks = chunks.len(),
            avg_chars = total / chunks.len(),
            "Split text into chunks"
        );
    }

    chunks
}

/// Planning metadata for one chunk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkPlan {
    pub index: usize,
    pub text_preview: String,
    pub char_count: usize,
}

/// Planning metadata for a streamed request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamPlan {
    pub total_chunks: usize,
    pub chunks: Vec<ChunkPlan>,
    /// Rough synthesis time for the whole text
    pub estimated_total_time: f64,
}

impl StreamPlan {
    pub fn from_chunks(chunks: &[String]) -> Self {
        let plans: Vec<ChunkPlan> = chunks
            .iter()
            .enumerate()
            .map(|(index, chunk)| ChunkPlan {
                index,
                text_preview: preview(chunk),
                char_count: chunk.chars().count(),
            })
            .collect();
        let total_chars = plans.iter().map(|p| p.char_count).sum();
        Self {
            total_chunks: plans.len(),
            chunks: plans,
            estimated_total_time: estimate_generation_secs(total_chars),
        }
    }
}

/// First characters of a chunk, with an ellipsis when truncated
pub fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Estimated synthesis time for `chars` characters, never below two seconds
pub fn estimate_generation_secs(chars: usize) -> f64 {
    (chars as f64 / CHARS_PER_SECOND).max(MIN_ESTIMATE_SECS)
}
