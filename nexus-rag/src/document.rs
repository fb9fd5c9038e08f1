//! Data types for documents, chunks, and search results.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Metadata key recording where a document came from.
pub const SOURCE_KEY: &str = "source";
/// `source` value for documents read from uploaded files.
pub const SOURCE_FILE: &str = "file";
/// `source` value for documents synthesized from a question/answer exchange.
pub const SOURCE_CHAT_MEMORY: &str = "chat_memory";
/// Metadata key classifying synthesized documents.
pub const TYPE_KEY: &str = "type";
/// `type` value for learned question/answer documents.
pub const TYPE_LEARNED: &str = "learned_knowledge";

/// A source document containing text content and metadata.
///
/// Documents are immutable once created. Provenance is carried in the
/// `source` metadata tag: [`SOURCE_FILE`] or [`SOURCE_CHAT_MEMORY`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// Key-value metadata associated with the document.
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Create a document with empty metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), metadata: HashMap::new() }
    }

    /// Create a document read from a file on disk.
    ///
    /// Sets `source = "file"` plus `file_name` and `file_path`.
    pub fn from_file(id: impl Into<String>, text: impl Into<String>, path: &Path) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert(SOURCE_KEY.to_string(), SOURCE_FILE.to_string());
        if let Some(name) = path.file_name() {
            metadata.insert("file_name".to_string(), name.to_string_lossy().into_owned());
        }
        metadata.insert("file_path".to_string(), path.display().to_string());
        Self { id: id.into(), text: text.into(), metadata }
    }

    /// Synthesize a document from a completed question/answer exchange.
    pub fn learned(question: &str, answer: &str) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert(SOURCE_KEY.to_string(), SOURCE_CHAT_MEMORY.to_string());
        metadata.insert(TYPE_KEY.to_string(), TYPE_LEARNED.to_string());
        Self {
            id: format!("memory-{}", uuid::Uuid::new_v4()),
            text: format!("User asked: {question}\nAnswer: {answer}"),
            metadata,
        }
    }

    /// Insert a metadata entry, returning the updated document.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The `source` tag, if any.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(String::as_str)
    }
}

/// A segment of a [`Document`] with its vector embedding.
///
/// This is the unit stored in a collection. `id` is unique within the
/// collection; upserting an existing id replaces the previous record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk.
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// The vector embedding for this chunk's text.
    pub embedding: Vec<f32>,
    /// Key-value metadata inherited from the parent document plus chunk-specific fields.
    pub metadata: HashMap<String, String>,
    /// The ID of the parent [`Document`].
    pub document_id: String,
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}
