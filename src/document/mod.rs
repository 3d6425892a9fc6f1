mod loader;
pub mod splitter;

pub use loader::{detect_kind, load_document};
pub use splitter::{split_document, Chunk, ChunkConfig, ChunkInfo, ChunkStrategy};

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Text,
}

/// A file as received from the UI, before any text extraction.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// Extracted text of one uploaded file. Dropped once it has been chunked.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: Uuid,
    pub filename: String,
    pub kind: DocumentKind,
    pub text: String,
    pub pages: usize,
}

impl Document {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Summary of a loaded document kept in the session after the text itself is gone.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub id: Uuid,
    pub filename: String,
    pub kind: DocumentKind,
    pub pages: usize,
    pub characters: usize,
    pub chunks: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentInfo {
    pub total_documents: usize,
    pub total_characters: usize,
    pub avg_chars_per_doc: usize,
}

impl DocumentInfo {
    pub fn from_summaries(docs: &[DocumentSummary]) -> Self {
        let total_characters: usize = docs.iter().map(|d| d.characters).sum();
        Self {
            total_documents: docs.len(),
            total_characters,
            avg_chars_per_doc: if docs.is_empty() { 0 } else { total_characters / docs.len() },
        }
    }
}
