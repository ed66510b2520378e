//! Recursive character text splitter.
//!
//! Splits document text into overlapping windows that respect a maximum
//! size in characters. Natural boundaries are preferred: paragraphs first,
//! then lines, then words, and only as a last resort single characters.
//!
//! # Algorithm
//!
//! 1. Pick the first separator from `["\n\n", "\n", " ", ""]` that occurs in
//!    the text (`""` always matches and means "between characters").
//! 2. Split the text on it. Pieces shorter than `chunk_size` are queued;
//!    longer pieces are split again with the remaining, finer separators.
//! 3. Queued pieces are merged into windows of at most `chunk_size`
//!    characters. When a window is flushed, pieces are dropped from its
//!    front until at most `chunk_overlap` characters remain, and those
//!    carry over as the start of the next window.
//! 4. Every window is trimmed; empty windows are discarded.
//!
//! Sizes are counted in Unicode scalar values, never bytes, so multibyte
//! text cannot be cut inside a character.
//!
//! # Example
//!
//! ```rust
//! use okr_harness_core::chunk::TextSplitter;
//!
//! let splitter = TextSplitter::default();
//! let chunks = splitter.split("# Objective\n\n- KR1: Ship it.");
//! assert_eq!(chunks.len(), 1);
//! ```

use std::collections::VecDeque;

use crate::models::{Chunk, Document};

/// Default window size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default number of characters shared by consecutive windows.
pub const DEFAULT_CHUNK_OVERLAP: usize = 150;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Deterministic overlapping text splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl TextSplitter {
    /// Create a splitter. `chunk_size` is raised to at least 1 and
    /// `chunk_overlap` is clamped below `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into trimmed, non-empty windows.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let (separator, finer) = pick_separator(text, separators);

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|p| !p.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending, separator));
                pending.clear();
            }
            if finer.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_with(piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending, separator));
        }

        chunks
    }

    /// Merge small pieces into windows, carrying overlap between them.
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut out = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { sep_len };

            if total + len + joiner > self.chunk_size && !window.is_empty() {
                push_joined(&mut out, &window, separator);

                loop {
                    let joiner = if window.is_empty() { 0 } else { sep_len };
                    let over_overlap = total > self.chunk_overlap;
                    let no_room = total > 0 && total + len + joiner > self.chunk_size;
                    if !(over_overlap || no_room) {
                        break;
                    }
                    let Some((_, first_len)) = window.pop_front() else {
                        break;
                    };
                    let dropped = first_len + if window.is_empty() { 0 } else { sep_len };
                    total = total.saturating_sub(dropped);
                }
            }

            total += len + if window.is_empty() { 0 } else { sep_len };
            window.push_back((piece, len));
        }

        push_joined(&mut out, &window, separator);
        out
    }
}

/// Chunk one document, copying its metadata onto every chunk.
///
/// Returns an empty `Vec` for documents whose text is blank.
pub fn chunk_document(doc: &Document, splitter: &TextSplitter) -> Vec<Chunk> {
    splitter
        .split(&doc.text)
        .into_iter()
        .map(|text| Chunk::from_document(doc, text))
        .collect()
}

fn pick_separator<'a, 's>(text: &str, separators: &'a [&'s str]) -> (&'s str, &'a [&'s str]) {
    for (i, &sep) in separators.iter().enumerate() {
        if sep.is_empty() {
            return (sep, &[]);
        }
        if text.contains(sep) {
            return (sep, &separators[i + 1..]);
        }
    }
    ("", &[])
}

fn push_joined(out: &mut Vec<String>, window: &VecDeque<(&str, usize)>, separator: &str) {
    let joined = window
        .iter()
        .map(|(piece, _)| *piece)
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
