//! Splitting extracted document text into overlapping chunks.
//!
//! Two strategies are available. `Fixed` cuts windows of exactly `chunk_size`
//! characters that advance by `chunk_size - chunk_overlap`, so every chunk but
//! the last has the same length and neighbours share exactly `chunk_overlap`
//! characters. `Recursive` prefers paragraph, line, sentence and word
//! boundaries and only guarantees that no chunk exceeds `chunk_size`.
//!
//! Lengths are counted in Unicode scalar values, not bytes.

use std::collections::VecDeque;

use serde::Serialize;
use uuid::Uuid;

use super::Document;
use crate::config::ConfigError;
use crate::error::RagError;

const RECURSIVE_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    Fixed,
    Recursive,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub strategy: ChunkStrategy,
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ConfigError> {
        if chunk_size == 0 {
            return Err(ConfigError::Invalid {
                key: "CHUNK_SIZE",
                value: chunk_size.to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if chunk_overlap >= chunk_size {
            return Err(ConfigError::Invalid {
                key: "CHUNK_OVERLAP",
                value: chunk_overlap.to_string(),
                reason: "must be smaller than CHUNK_SIZE".to_string(),
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            strategy: ChunkStrategy::Fixed,
        })
    }

    /// Overlap given as a fraction of the chunk size, rounded down to whole characters.
    pub fn with_overlap_fraction(chunk_size: usize, fraction: f32) -> Result<Self, ConfigError> {
        if !(0.0..1.0).contains(&fraction) {
            return Err(ConfigError::Invalid {
                key: "CHUNK_OVERLAP",
                value: fraction.to_string(),
                reason: "fraction must be within 0.0..1.0".to_string(),
            });
        }
        Self::new(chunk_size, (chunk_size as f32 * fraction).floor() as usize)
    }

    pub fn with_strategy(mut self, strategy: ChunkStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    fn splitter(&self) -> Box<dyn TextSplitter> {
        match self.strategy {
            ChunkStrategy::Fixed => Box::new(FixedSizeSplitter {
                chunk_size: self.chunk_size,
                chunk_overlap: self.chunk_overlap,
            }),
            ChunkStrategy::Recursive => Box::new(RecursiveSplitter {
                chunk_size: self.chunk_size,
                chunk_overlap: self.chunk_overlap,
            }),
        }
    }
}

/// A piece of one document's text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub document_id: Uuid,
    pub source: String,
    pub index: usize,
    /// Character offset of the chunk's first character within the document text.
    pub char_offset: usize,
    pub text: String,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A chunk's text and the character offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub char_offset: usize,
    pub text: String,
}

pub trait TextSplitter: Send + Sync {
    fn split_text(&self, text: &str) -> Vec<TextSpan>;
}

pub struct FixedSizeSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter for FixedSizeSplitter {
    fn split_text(&self, text: &str) -> Vec<TextSpan> {
        // Byte position of every char boundary, including the end of the text.
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = bounds.len() - 1;
        if total == 0 {
            return Vec::new();
        }

        let stride = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::with_capacity(total / stride + 1);
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(total);
            chunks.push(TextSpan {
                char_offset: start,
                text: text[bounds[start]..bounds[end]].to_string(),
            });
            if end == total {
                break;
            }
            start += stride;
        }
        chunks
    }
}

pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveSplitter {
    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = "";
        let mut remaining: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() || text.contains(sep) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|p| !p.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut small: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                small.push(piece);
                continue;
            }
            if !small.is_empty() {
                chunks.extend(self.merge(&small, separator));
                small.clear();
            }
            if remaining.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_with(piece, remaining));
            }
        }
        if !small.is_empty() {
            chunks.extend(self.merge(&small, separator));
        }
        chunks
    }

    /// Greedily packs pieces into chunks joined by `separator`, carrying
    /// trailing pieces worth at most `chunk_overlap` characters into the next
    /// chunk. `total` always equals the joined length of `current`.
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut merged = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len + gap(&current, sep_len) > self.chunk_size && !current.is_empty() {
                push_joined(&current, separator, &mut merged);
                while total > self.chunk_overlap
                    || (total > 0 && total + len + gap(&current, sep_len) > self.chunk_size)
                {
                    match current.pop_front() {
                        Some(first) => total -= char_len(first) + gap(&current, sep_len),
                        None => break,
                    }
                }
            }
            total += len + gap(&current, sep_len);
            current.push_back(piece);
        }
        push_joined(&current, separator, &mut merged);
        merged
    }
}

/// Separator length paid when one more piece joins `current`.
fn gap(current: &VecDeque<&str>, sep_len: usize) -> usize {
    if current.is_empty() {
        0
    } else {
        sep_len
    }
}

impl TextSplitter for RecursiveSplitter {
    fn split_text(&self, text: &str) -> Vec<TextSpan> {
        locate(text, self.split_with(text, RECURSIVE_SEPARATORS))
    }
}

/// Finds where each trimmed chunk starts. Chunks are searched in order, each
/// strictly after the start of its predecessor.
fn locate(text: &str, chunks: Vec<String>) -> Vec<TextSpan> {
    let mut spans = Vec::with_capacity(chunks.len());
    let mut cursor_byte = 0;
    let mut cursor_char = 0;
    for chunk in chunks {
        let (byte_offset, char_offset) = match text[cursor_byte..].find(chunk.as_str()) {
            Some(rel) => (
                cursor_byte + rel,
                cursor_char + text[cursor_byte..cursor_byte + rel].chars().count(),
            ),
            None => (cursor_byte, cursor_char),
        };
        match text[byte_offset..].chars().next() {
            Some(c) => {
                cursor_byte = byte_offset + c.len_utf8();
                cursor_char = char_offset + 1;
            }
            None => {
                cursor_byte = byte_offset;
                cursor_char = char_offset;
            }
        }
        spans.push(TextSpan {
            char_offset,
            text: chunk,
        });
    }
    spans
}

fn push_joined(pieces: &VecDeque<&str>, separator: &str, out: &mut Vec<String>) {
    let joined = pieces.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split a loaded document into ordered chunks.
pub fn split_document(doc: &Document, config: &ChunkConfig) -> Result<Vec<Chunk>, RagError> {
    if doc.text.trim().is_empty() {
        return Err(RagError::empty_document(&doc.filename, "the document contains no text"));
    }

    let spans = config.splitter().split_text(&doc.text);
    if spans.is_empty() {
        return Err(RagError::empty_document(&doc.filename, "no chunks could be produced"));
    }

    let chunks: Vec<Chunk> = spans
        .into_iter()
        .enumerate()
        .map(|(index, span)| Chunk {
            document_id: doc.id,
            source: doc.filename.clone(),
            index,
            char_offset: span.char_offset,
            text: span.text,
        })
        .collect();

    log::debug!("Split '{}' into {} chunks", doc.filename, chunks.len());
    Ok(chunks)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChunkInfo {
    pub total_chunks: usize,
    pub avg_chunk_size: usize,
    pub min_chunk_size: usize,
    pub max_chunk_size: usize,
}

impl ChunkInfo {
    pub fn from_sizes(sizes: impl IntoIterator<Item = usize>) -> Self {
        let sizes: Vec<usize> = sizes.into_iter().collect();
        if sizes.is_empty() {
            return Self::default();
        }
        Self {
            total_chunks: sizes.len(),
            avg_chunk_size: sizes.iter().sum::<usize>() / sizes.len(),
            min_chunk_size: sizes.iter().copied().min().unwrap_or(0),
            max_chunk_size: sizes.iter().copied().max().unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentKind;

    fn doc(text: &str) -> Document {
        Document {
            id: Uuid::new_v4(),
            filename: "test.txt".to_string(),
            kind: DocumentKind::Text,
            text: text.to_string(),
            pages: 1,
        }
    }

    fn fixed(size: usize, overlap: usize) -> ChunkConfig {
        ChunkConfig::new(size, overlap).unwrap()
    }

    /// Strips each chunk's leading overlap and concatenates what is left.
    fn reconstruct(chunks: &[Chunk], overlap: usize) -> String {
        chunks
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let skip = if i == 0 { 0 } else { overlap };
                c.text.chars().skip(skip).collect::<String>()
            })
            .collect()
    }

    fn sample_text() -> String {
        (0..40)
            .map(|i| format!("Sentence number {i} talks about topic {}. ", i % 7))
            .collect()
    }

    #[test]
    fn fixed_chunks_reconstruct_document() {
        let text = sample_text();
        for (size, overlap) in [(50, 0), (50, 10), (64, 63), (7, 3), (1, 0)] {
            let chunks = split_document(&doc(&text), &fixed(size, overlap)).unwrap();
            assert_eq!(reconstruct(&chunks, overlap), text, "size={size} overlap={overlap}");
        }
    }

    #[test]
    fn fixed_chunks_have_exact_size_and_overlap() {
        let text = sample_text();
        let (size, overlap) = (120, 30);
        let chunks = split_document(&doc(&text), &fixed(size, overlap)).unwrap();
        assert!(chunks.len() > 2);

        for chunk in &chunks[..chunks.len() - 1] {
            assert_eq!(chunk.char_len(), size);
        }
        assert!(chunks.last().unwrap().char_len() <= size);

        for pair in chunks.windows(2) {
            let tail: String = pair[0].text.chars().skip(size - overlap).collect();
            let head: String = pair[1].text.chars().take(overlap).collect();
            assert_eq!(tail, head);
            assert_eq!(pair[1].char_offset - pair[0].char_offset, size - overlap);
        }
    }

    #[test]
    fn short_document_is_single_chunk() {
        let chunks = split_document(&doc("tiny"), &fixed(500, 100)).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "tiny");
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].char_offset, 0);
    }

    #[test]
    fn exact_multiple_does_not_emit_trailing_overlap_only_chunk() {
        let chunks = split_document(&doc("abcdefghij"), &fixed(5, 0)).unwrap();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcde", "fghij"]);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "héllo wörld ñandú café";
        let chunks = split_document(&doc(text), &fixed(6, 2)).unwrap();
        for chunk in &chunks[..chunks.len() - 1] {
            assert_eq!(chunk.char_len(), 6);
        }
        assert_eq!(reconstruct(&chunks, 2), text);
    }

    #[test]
    fn empty_document_is_typed_error() {
        let err = split_document(&doc("   \n "), &fixed(10, 2)).unwrap_err();
        assert!(matches!(err, RagError::EmptyDocument { .. }));
    }

    #[test]
    fn chunks_carry_document_identity() {
        let d = doc(&sample_text());
        let chunks = split_document(&d, &fixed(100, 20)).unwrap();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.document_id, d.id);
            assert_eq!(chunk.source, "test.txt");
            assert_eq!(chunk.index, i);
        }
    }

    #[test]
    fn overlap_fraction_rounds_down() {
        let config = ChunkConfig::with_overlap_fraction(500, 0.2).unwrap();
        assert_eq!(config.chunk_overlap, 100);
        let config = ChunkConfig::with_overlap_fraction(7, 0.5).unwrap();
        assert_eq!(config.chunk_overlap, 3);
        assert!(ChunkConfig::with_overlap_fraction(10, 1.0).is_err());
        assert!(ChunkConfig::new(10, 10).is_err());
        assert!(ChunkConfig::new(0, 0).is_err());
    }

    #[test]
    fn recursive_chunks_respect_size_limit() {
        let text = sample_text();
        let config = fixed(80, 20).with_strategy(ChunkStrategy::Recursive);
        let chunks = split_document(&doc(&text), &config).unwrap();
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.char_len() <= 80, "chunk too long: {:?}", chunk.text);
            assert!(!chunk.text.is_empty());
        }
    }

    #[test]
    fn recursive_prefers_paragraph_boundaries() {
        let text = "First paragraph about apples.\n\nSecond paragraph about pears.\n\nThird one about plums.";
        let config = fixed(40, 0).with_strategy(ChunkStrategy::Recursive);
        let chunks = split_document(&doc(text), &config).unwrap();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "First paragraph about apples.",
                "Second paragraph about pears.",
                "Third one about plums."
            ]
        );
        assert_eq!(chunks[1].char_offset, text.find("Second").unwrap());
    }

    #[test]
    fn recursive_carries_overlap_between_chunks() {
        let text = "one two three four five six seven eight nine ten eleven twelve";
        let config = fixed(20, 8).with_strategy(ChunkStrategy::Recursive);
        let chunks = split_document(&doc(text), &config).unwrap();
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let last_word = pair[0].text.split_whitespace().last().unwrap();
            assert!(
                pair[1].text.starts_with(last_word),
                "expected {:?} to start with {:?}",
                pair[1].text,
                last_word
            );
        }
    }

    #[test]
    fn recursive_packs_pieces_up_to_the_limit() {
        let text = "ab ab ab ab ab ab ab";
        let config = fixed(5, 3).with_strategy(ChunkStrategy::Recursive);
        let chunks = split_document(&doc(text), &config).unwrap();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["ab ab"; 6]);
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].char_offset - pair[0].char_offset, 3);
        }
    }

    #[test]
    fn recursive_skips_whitespace_only_pieces() {
        let text = "x\n\n\n\n\ny";
        let config = fixed(1, 0).with_strategy(ChunkStrategy::Recursive);
        let chunks = split_document(&doc(text), &config).unwrap();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["x", "y"]);
        assert_eq!(chunks[1].char_offset, 6);
    }

    #[test]
    fn chunk_info_statistics() {
        let info = ChunkInfo::from_sizes([10, 20, 30]);
        assert_eq!(info.total_chunks, 3);
        assert_eq!(info.avg_chunk_size, 20);
        assert_eq!(info.min_chunk_size, 10);
        assert_eq!(info.max_chunk_size, 30);
        assert_eq!(ChunkInfo::from_sizes(Vec::new()), ChunkInfo::default());
    }
}
