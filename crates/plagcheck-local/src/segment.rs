//! Chunk and sentence segmentation.

use plagcheck_core::Chunk;
use unicode_segmentation::UnicodeSegmentation;

/// Chunk size used for web-search queries.
pub const SEARCH_CHUNK_WORDS: usize = 150;
/// Chunk size for callers that want short comparison windows.
pub const SHORT_CHUNK_WORDS: usize = 40;

/// Byte spans of whitespace-separated words.
fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    for (i, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(s) = start.take() {
                out.push((s, i));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        out.push((s, text.len()));
    }
    out
}

/// Group words into windows of `size`, dropping windows under `min_words` and
/// keeping at most `max_chunks`.
///
/// Chunk text is the window's words joined by single spaces.
pub fn split_into_chunks(
    text: &str,
    size: usize,
    min_words: usize,
    max_chunks: usize,
) -> Vec<Chunk> {
    let size = size.max(1);
    let spans = word_spans(text);
    let mut out = Vec::new();
    for (window_idx, window) in spans.chunks(size).enumerate() {
        if out.len() >= max_chunks {
            break;
        }
        if window.len() < min_words.max(1) {
            continue;
        }
        let words: Vec<&str> = window.iter().map(|&(s, e)| &text[s..e]).collect();
        out.push(Chunk {
            index: out.len(),
            word_offset: window_idx * size,
            byte_offset: window[0].0,
            word_count: window.len(),
            text: words.join(" "),
        });
    }
    out
}

/// UAX #29 sentence boundaries, trimmed; sentences without any alphanumeric
/// character are dropped.
pub fn split_into_sentences(text: &str) -> Vec<String> {
    text.unicode_sentences()
        .map(str::trim)
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .map(str::to_string)
        .collect()
}
