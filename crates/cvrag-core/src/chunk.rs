//! Recursive character text splitter.
//!
//! Splits cleaned document text into [`Chunk`]s of at most `chunk_size`
//! characters, carrying up to `chunk_overlap` characters of trailing
//! context into the next chunk so that facts straddling a boundary remain
//! retrievable.
//!
//! # Algorithm
//!
//! 1. Pick the first separator from `["\n\n", "\n", " ", ""]` that occurs in
//!    the text (`""` splits into single characters).
//! 2. Split on it. Pieces shorter than `chunk_size` are collected; longer
//!    pieces are split recursively with the remaining separators.
//! 3. Collected pieces are merged greedily up to `chunk_size`. When a chunk
//!    is emitted, pieces are dropped from its front until at most
//!    `chunk_overlap` characters remain; those seed the next chunk.
//!
//! Lengths are measured in characters, not bytes.
//!
//! # Example
//!
//! ```rust
//! use cvrag_core::chunk::chunk_document;
//! use cvrag_core::models::SourceDocument;
//!
//! let doc = SourceDocument::new("job_description", "Senior Rust engineer.\n\nRemote friendly.");
//! let chunks = chunk_document(&doc, 1000, 200).unwrap();
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].source_tag, "job_description");
//! ```

use std::collections::VecDeque;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::ConfigError;
use crate::models::{Chunk, SourceDocument};

/// Default maximum chunk length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Normalize extracted text: drop NUL bytes, trim every line and remove
/// blank lines.
pub fn clean_text(text: &str) -> String {
    text.replace('\0', "")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Clean, split and tag a document.
///
/// Returns chunks with contiguous `sequence_index` values starting at 0.
/// A document with no text after cleaning yields no chunks.
pub fn chunk_document(
    doc: &SourceDocument,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<Chunk>, ConfigError> {
    let cleaned = clean_text(&doc.body);
    let pieces = split_text(&cleaned, chunk_size, chunk_overlap)?;
    Ok(pieces
        .iter()
        .enumerate()
        .map(|(i, piece)| make_chunk(&doc.source_tag, i as i64, piece))
        .collect())
}

/// Split text into overlapping pieces of at most `chunk_size` characters.
pub fn split_text(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<String>, ConfigError> {
    if chunk_size == 0 {
        return Err(ConfigError::malformed("chunk_size", "must be > 0"));
    }
    if chunk_overlap >= chunk_size {
        return Err(ConfigError::malformed(
            "chunk_overlap",
            format!("must be smaller than chunk_size ({chunk_size})"),
        ));
    }
    let splitter = Splitter {
        chunk_size,
        chunk_overlap,
    };
    Ok(splitter.split(text, &SEPARATORS))
}

struct Splitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Splitter {
    fn split(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut remaining: &[&str] = &[];
        for (i, &sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = sep;
                break;
            }
            if text.contains(sep) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let splits: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|s| !s.is_empty()).collect()
        };

        let mut out = Vec::new();
        let mut good: Vec<&str> = Vec::new();
        for piece in splits {
            if char_len(piece) < self.chunk_size {
                good.push(piece);
                continue;
            }
            if !good.is_empty() {
                out.extend(self.merge(&good, separator));
                good.clear();
            }
            if remaining.is_empty() {
                out.push(piece.trim().to_string());
            } else {
                out.extend(self.split(piece, remaining));
            }
        }
        if !good.is_empty() {
            out.extend(self.merge(&good, separator));
        }
        out.retain(|s| !s.is_empty());
        out
    }

    fn merge(&self, splits: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in splits {
            let len = char_len(piece);
            let joiner = if current.is_empty() { 0 } else { sep_len };
            if total + len + joiner > self.chunk_size && !current.is_empty() {
                push_joined(&mut docs, &current, separator);
                while total > self.chunk_overlap
                    || (total > 0
                        && total + len + if current.is_empty() { 0 } else { sep_len }
                            > self.chunk_size)
                {
                    let Some(front) = current.pop_front() else {
                        break;
                    };
                    total -= char_len(front) + if current.is_empty() { 0 } else { sep_len };
                }
            }
            total += len + if current.is_empty() { 0 } else { sep_len };
            current.push_back(piece);
        }
        push_joined(&mut docs, &current, separator);
        docs
    }
}

fn push_joined(docs: &mut Vec<String>, parts: &VecDeque<&str>, separator: &str) {
    let joined = parts.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Create a single [`Chunk`] with a UUID and SHA-256 content hash.
fn make_chunk(source_tag: &str, index: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        content: text.to_string(),
        source_tag: source_tag.to_string(),
        sequence_index: index,
        hash,
    }
}
