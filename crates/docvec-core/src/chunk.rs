//! Overlapping text chunker with sentence, paragraph and character fallbacks.
//!
//! Splits extracted document text into passages of at most `target_size`
//! characters, carrying the trailing `overlap` characters of each closed
//! chunk into the next one.
//!
//! # Algorithm
//!
//! 1. Normalize line endings to `\n` and trim the text.
//! 2. Split into sentence units at `.`, `!` or `?` followed by whitespace
//!    (or end of text). If the text has at least one such boundary,
//!    accumulate sentences into chunks.
//! 3. Otherwise split into paragraph units on blank lines. If there are at
//!    least two paragraphs, accumulate paragraphs into chunks.
//! 4. Otherwise cut fixed character windows of `target_size`, advancing by
//!    `target_size - overlap` (at least one character).
//!
//! Accumulation closes the current chunk when appending the next unit would
//! exceed `target_size`, then seeds the next chunk with the closed chunk's
//! trailing `overlap` characters (shrunk if needed so the seed plus the next
//! unit still fits). Every chunk is a contiguous slice of the normalized
//! text, so a text shorter than `target_size` yields exactly one chunk equal
//! to the trimmed input.
//!
//! A single unit longer than `target_size` is emitted whole; only the
//! character-window fallback cuts mid-unit. Sizes are counted in `char`s.
//!
//! # Example
//!
//! ```rust
//! use docvec_core::chunk::split_text;
//!
//! let chunks = split_text("First sentence. Second sentence.", 500, 100).unwrap();
//! assert_eq!(chunks, vec!["First sentence. Second sentence."]);
//! assert!(split_text("   ", 500, 100).unwrap().is_empty());
//! ```

use crate::error::ValidationError;
use crate::models::DocumentChunk;

/// Chunking parameters, validated on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    target_size: usize,
    overlap: usize,
}

impl Chunker {
    /// Requires `target_size > 0` and `overlap < target_size`.
    pub fn new(target_size: usize, overlap: usize) -> Result<Self, ValidationError> {
        if target_size == 0 {
            return Err(ValidationError::ZeroTargetSize);
        }
        if overlap >= target_size {
            return Err(ValidationError::OverlapTooLarge {
                overlap,
                target_size,
            });
        }
        Ok(Self {
            target_size,
            overlap,
        })
    }

    pub fn target_size(&self) -> usize {
        self.target_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into chunk strings. Never returns an empty string.
    pub fn split(&self, text: &str) -> Vec<String> {
        let normalized = normalize_line_endings(text);
        let text = normalized.trim();
        if text.is_empty() {
            return Vec::new();
        }

        let sentences = sentence_spans(text);
        if !sentences.is_empty() {
            return self.accumulate(text, &sentences);
        }

        let paragraphs = paragraph_spans(text);
        if !paragraphs.is_empty() {
            return self.accumulate(text, &paragraphs);
        }

        self.char_windows(text)
    }

    /// Split `text` into indexed [`DocumentChunk`]s (`index` 0-based, contiguous).
    pub fn chunk(&self, text: &str) -> Vec<DocumentChunk> {
        let pieces = self.split(text);
        let of_total = pieces.len();
        pieces
            .into_iter()
            .enumerate()
            .map(|(index, text)| DocumentChunk {
                text,
                index,
                of_total,
            })
            .collect()
    }

    fn accumulate(&self, text: &str, units: &[Span]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current: Option<Span> = None;

        for unit in units {
            let cur = match current {
                None => {
                    current = Some(*unit);
                    continue;
                }
                Some(cur) => cur,
            };

            if char_len(&text[cur.start..unit.end]) <= self.target_size {
                current = Some(Span {
                    start: cur.start,
                    end: unit.end,
                });
                continue;
            }

            push_trimmed(&mut chunks, &text[cur.start..cur.end]);

            // Gap plus unit must fit alongside the seed.
            let tail_len = char_len(&text[cur.end..unit.end]);
            let room = self.target_size.saturating_sub(tail_len);
            let seed_chars = self
                .overlap
                .min(room)
                .min(char_len(&text[cur.start..cur.end]));

            let start = if seed_chars == 0 {
                unit.start
            } else {
                seed_start(text, cur.end, seed_chars)
            };
            current = Some(Span {
                start,
                end: unit.end,
            });
        }

        if let Some(cur) = current {
            push_trimmed(&mut chunks, &text[cur.start..cur.end]);
        }

        chunks
    }

    fn char_windows(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let step = self.target_size.saturating_sub(self.overlap).max(1);
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let end = (start + self.target_size).min(chars.len());
            let window: String = chars[start..end].iter().collect();
            push_trimmed(&mut chunks, &window);
            if end == chars.len() {
                break;
            }
            start += step;
        }

        chunks
    }
}

/// Split `text` into chunk strings of at most `target_size` characters
/// (see the module docs for the exact policy).
pub fn split_text(
    text: &str,
    target_size: usize,
    overlap: usize,
) -> Result<Vec<String>, ValidationError> {
    Ok(Chunker::new(target_size, overlap)?.split(text))
}

/// Like [`split_text`], but returns indexed [`DocumentChunk`]s.
pub fn chunk_text(
    text: &str,
    target_size: usize,
    overlap: usize,
) -> Result<Vec<DocumentChunk>, ValidationError> {
    Ok(Chunker::new(target_size, overlap)?.chunk(text))
}

/// Byte range of a trimmed unit within the normalized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
}

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn push_trimmed(chunks: &mut Vec<String>, piece: &str) {
    let trimmed = piece.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Byte offset where the last `n` chars before `end` begin.
fn seed_start(text: &str, end: usize, n: usize) -> usize {
    text[..end]
        .char_indices()
        .rev()
        .nth(n - 1)
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn push_span(text: &str, spans: &mut Vec<Span>, start: usize, end: usize) {
    let raw = &text[start..end];
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return;
    }
    let lead = raw.len() - raw.trim_start().len();
    spans.push(Span {
        start: start + lead,
        end: start + lead + trimmed.len(),
    });
}

/// Sentence units, or empty if the text has no sentence boundary at all.
fn sentence_spans(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut found = false;
    let mut iter = text.char_indices().peekable();

    while let Some((i, c)) = iter.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let at_boundary = iter.peek().map_or(true, |&(_, next)| next.is_whitespace());
        if at_boundary {
            let end = i + c.len_utf8();
            push_span(text, &mut spans, start, end);
            start = end;
            found = true;
        }
    }

    if !found {
        return Vec::new();
    }
    push_span(text, &mut spans, start, text.len());
    spans
}

/// Blank-line separated paragraphs, or empty if there are fewer than two.
fn paragraph_spans(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut para_start: Option<usize> = None;
    let mut para_end = 0;
    let mut offset = 0;

    for line in text.split('\n') {
        let line_start = offset;
        let line_end = offset + line.len();
        offset = line_end + 1;

        if line.trim().is_empty() {
            if let Some(start) = para_start.take() {
                push_span(text, &mut spans, start, para_end);
            }
        } else {
            if para_start.is_none() {
                para_start = Some(line_start);
            }
            para_end = line_end;
        }
    }
    if let Some(start) = para_start {
        push_span(text, &mut spans, start, para_end);
    }

    if spans.len() < 2 {
        return Vec::new();
    }
    spans
}
