//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`FixedSizeChunker`] splits by character count with configurable overlap
//! - [`RecursiveChunker`] splits hierarchically by paragraphs, lines, sentences, then words
//!
//! Sizes are measured in Unicode scalar values, never bytes, so a split can
//! not land inside a multi-byte character.

use crate::document::{Chunk, Document};

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s with text and metadata but no embeddings.
/// Embeddings are attached later by the [`IndexManager`](crate::IndexManager).
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has no non-whitespace text.
    /// A document that fits in one chunk yields exactly one chunk holding
    /// the full text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Build chunks from raw pieces, numbering them `{document_id}_{index}`.
fn into_chunks(document: &Document, pieces: Vec<String>) -> Vec<Chunk> {
    pieces
        .into_iter()
        .filter(|text| !text.trim().is_empty())
        .enumerate()
        .map(|(i, text)| {
            let mut metadata = document.metadata.clone();
            metadata.insert("chunk_index".to_string(), i.to_string());
            Chunk {
                id: format!("{}_{i}", document.id),
                text,
                embedding: Vec::new(),
                metadata,
                document_id: document.id.clone(),
            }
        })
        .collect()
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// The last `n` characters of `text`.
fn char_tail(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match text.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

/// Splits text into fixed-size chunks by character count with configurable overlap.
///
/// # Example
///
/// ```rust,ignore
/// use nexus_rag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(256, 50);
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - maximum number of characters per chunk
    /// * `chunk_overlap` - number of overlapping characters between consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size: chunk_size.max(1), chunk_overlap }
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        into_chunks(document, split_by_size(&document.text, self.chunk_size, self.chunk_overlap))
    }
}

/// Character-window splitting with overlap.
fn split_by_size(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size.saturating_sub(chunk_overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

/// Splits text hierarchically: paragraphs → lines → sentences → words.
///
/// Segments are greedily merged up to `chunk_size` characters. A segment
/// that is still too large is split with the next separator, and finally by
/// character windows. Each new chunk starts with the last `chunk_overlap`
/// characters of the previous one when that still fits.
///
/// # Example
///
/// ```rust,ignore
/// use nexus_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(1024, 200);
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - maximum number of characters per chunk
    /// * `chunk_overlap` - number of overlapping characters between consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size: chunk_size.max(1), chunk_overlap }
    }
}

const SEPARATORS: [&str; 6] = ["\n\n", "\n", ". ", "! ", "? ", " "];

fn split_and_merge(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &[&str],
) -> Vec<String> {
    if char_len(text) <= chunk_size {
        return vec![text.to_string()];
    }
    let Some((separator, remaining)) = separators.split_first() else {
        return split_by_size(text, chunk_size, chunk_overlap);
    };

    let mut chunks = Vec::new();
    let mut current = String::new();

    for segment in split_keeping_separator(text, separator) {
        if char_len(segment) > chunk_size {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.extend(split_and_merge(segment, chunk_size, chunk_overlap, remaining));
            continue;
        }

        if char_len(&current) + char_len(segment) <= chunk_size {
            current.push_str(segment);
            continue;
        }

        let tail = char_tail(&current, chunk_overlap).to_string();
        chunks.push(std::mem::take(&mut current));
        if char_len(&tail) + char_len(segment) <= chunk_size {
            current = tail;
        }
        current.push_str(segment);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Split text at a separator, keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.text.trim().is_empty() {
            return Vec::new();
        }
        let pieces =
            split_and_merge(&document.text, self.chunk_size, self.chunk_overlap, &SEPARATORS);
        into_chunks(document, pieces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_document_is_a_single_chunk() {
        let doc = Document::new("sky", "The sky is blue.");
        let chunks = RecursiveChunker::new(1024, 200).chunk(&doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "The sky is blue.");
        assert_eq!(chunks[0].id, "sky_0");
        assert_eq!(chunks[0].document_id, "sky");
        assert_eq!(chunks[0].metadata.get("chunk_index").map(String::as_str), Some("0"));
    }

    #[test]
    fn blank_document_yields_nothing() {
        let doc = Document::new("blank", " \n\t ");
        assert!(RecursiveChunker::new(100, 10).chunk(&doc).is_empty());
        assert!(FixedSizeChunker::new(100, 10).chunk(&doc).is_empty());
    }

    #[test]
    fn recursive_chunks_respect_size() {
        let paragraph = "Alpha beta gamma delta. Epsilon zeta eta theta! Iota kappa? ".repeat(20);
        let text = format!("{paragraph}\n\n{paragraph}");
        let doc = Document::new("greek", text);
        let chunks = RecursiveChunker::new(80, 20).chunk(&doc);
        assert!(chunks.len() > 2);
        for chunk in &chunks {
            assert!(char_len(&chunk.text) <= 80, "chunk too long: {}", chunk.text.len());
        }
    }

    #[test]
    fn recursive_preserves_metadata() {
        let doc = Document::new("d", "word ".repeat(100)).with_metadata("source", "file");
        for chunk in RecursiveChunker::new(50, 10).chunk(&doc) {
            assert_eq!(chunk.metadata.get("source").map(String::as_str), Some("file"));
        }
    }

    #[test]
    fn multibyte_text_is_never_split_inside_a_character() {
        let doc = Document::new("utf8", "äöü€😀".repeat(50));
        for chunker in [
            Box::new(FixedSizeChunker::new(7, 3)) as Box<dyn Chunker>,
            Box::new(RecursiveChunker::new(7, 3)) as Box<dyn Chunker>,
        ] {
            let chunks = chunker.chunk(&doc);
            assert!(!chunks.is_empty());
            for chunk in chunks {
                assert!(char_len(&chunk.text) <= 7);
            }
        }
    }

    #[test]
    fn fixed_size_windows_overlap() {
        let doc = Document::new("abc", "abcdefghij");
        let texts: Vec<String> =
            FixedSizeChunker::new(4, 2).chunk(&doc).into_iter().map(|c| c.text).collect();
        assert_eq!(texts, ["abcd", "cdef", "efgh", "ghij"]);
    }

    #[test]
    fn char_tail_counts_characters() {
        assert_eq!(char_tail("héllo", 3), "llo");
        assert_eq!(char_tail("hé", 5), "hé");
        assert_eq!(char_tail("abc", 0), "");
    }
}
