//! Paragraph-boundary text chunker.
//!
//! Splits document text into bounded-size chunks so that long documents fit
//! the embedding endpoint's input limit. Splitting occurs on paragraph
//! boundaries (`\n\n`) to preserve semantic coherence: paragraphs accumulate
//! into a chunk until adding the next one would exceed `max_size`, then the
//! chunk is flushed. A single paragraph longer than `max_size` is emitted
//! whole as its own oversized chunk — paragraphs are never split internally.
//!
//! The notion of "size" is pluggable: [`char_len`] counts characters and
//! [`token_estimate`] approximates tokens, so both the character-budget and
//! token-budget policies share one implementation.

/// Approximate chars-per-token ratio used by [`token_estimate`].
const CHARS_PER_TOKEN: usize = 4;

/// Character count length function.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Rough token count length function (4 chars per token).
pub fn token_estimate(s: &str) -> usize {
    s.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Split text into chunks on paragraph boundaries, respecting `max_size`
/// under the supplied length function.
///
/// Blank paragraphs are skipped; surviving paragraph text is kept verbatim,
/// so joining a chunk's paragraphs with `"\n\n"` reconstructs the segmented
/// text. Empty (or whitespace-only) input yields no chunks.
pub fn chunk_text<F>(text: &str, max_size: usize, len: F) -> Vec<String>
where
    F: Fn(&str) -> usize,
{
    let sep_len = len("\n\n");
    let mut chunks = Vec::new();
    let mut current = String::new();

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        if current.is_empty() {
            current.push_str(trimmed);
            continue;
        }

        if len(&current) + sep_len + len(trimmed) > max_size {
            chunks.push(std::mem::take(&mut current));
            current.push_str(trimmed);
        } else {
            current.push_str("\n\n");
            current.push_str(trimmed);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Character-budget chunking, the policy used for embedding input limits.
pub fn chunk_by_chars(text: &str, max_chars: usize) -> Vec<String> {
    chunk_text(text, max_chars, char_len)
}
