//! Knowledge system type definitions.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A stored, embeddable unit of document text. Immutable once indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Unique chunk identifier
    pub chunk_id: String,

    /// Path of the source document (e.g., "docs/guide.md")
    pub document_path: String,

    /// Human-readable document title
    pub document_title: String,

    /// Text content
    pub content: String,

    /// Embedding vector
    pub embedding: Vec<f32>,
}

/// A chunk scored against a query.
///
/// Request-scoped; the underlying chunk is shared with the store.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: Arc<Chunk>,

    /// Cosine similarity to the query, in [-1, 1]
    pub similarity: f32,

    /// Ordinal position of the chunk within its source document
    pub chunk_index: u32,
}

impl RetrievedChunk {
    pub fn chunk_id(&self) -> &str {
        &self.chunk.chunk_id
    }

    pub fn document_path(&self) -> &str {
        &self.chunk.document_path
    }

    pub fn document_title(&self) -> &str {
        &self.chunk.document_title
    }

    pub fn content(&self) -> &str {
        &self.chunk.content
    }
}

/// Mean similarity of a set of retrieved chunks, 0 when empty.
pub fn average_similarity(chunks: &[RetrievedChunk]) -> f32 {
    if chunks.is_empty() {
        return 0.0;
    }
    chunks.iter().map(|c| c.similarity).sum::<f32>() / chunks.len() as f32
}
