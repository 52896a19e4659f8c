//! Chunk store.
//!
//! The store owns indexed chunks and hands them out read-only. Insertion order
//! is preserved because the retriever uses it to break similarity ties.

use crate::embeddings::EmbeddingProvider;
use crate::types::Chunk;
use async_trait::async_trait;
use grounded_core::{AppError, AppResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::RwLock;

/// A chunk as held by the store, with its position inside its document.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub chunk: Arc<Chunk>,
    pub chunk_index: u32,
}

/// Read access to indexed chunks and document metadata.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// All chunks, in insertion order.
    async fn chunks(&self) -> AppResult<Vec<StoredChunk>>;

    /// Resolve a document path to its title.
    async fn document_title(&self, path: &str) -> AppResult<Option<String>>;
}

#[derive(Debug, Default)]
struct StoreState {
    chunks: Vec<StoredChunk>,
    /// document path -> (title, chunks seen so far)
    documents: HashMap<String, (String, u32)>,
}

/// In-memory chunk store guarded by a `tokio::sync::RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryChunkStore {
    state: RwLock<StoreState>,
}

/// One line of a chunk JSONL file. Missing fields are derived on load.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChunkRecord {
    #[serde(default)]
    chunk_id: Option<String>,
    document_path: String,
    #[serde(default)]
    document_title: Option<String>,
    content: String,
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

impl InMemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk. Its `chunk_index` is the number of chunks already
    /// stored for the same document.
    pub async fn insert(&self, chunk: Chunk) {
        let mut state = self.state.write().await;

        let entry = state
            .documents
            .entry(chunk.document_path.clone())
            .or_insert_with(|| (chunk.document_title.clone(), 0));
        let chunk_index = entry.1;
        entry.1 += 1;

        state.chunks.push(StoredChunk {
            chunk: Arc::new(chunk),
            chunk_index,
        });
    }

    /// Append several chunks, keeping their order.
    pub async fn insert_many(&self, chunks: impl IntoIterator<Item = Chunk>) {
        for chunk in chunks {
            self.insert(chunk).await;
        }
    }

    /// Number of stored chunks.
    pub async fn len(&self) -> usize {
        self.state.read().await.chunks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Load chunks from a JSONL file, one JSON object per line.
    ///
    /// Records without an `embedding` are embedded with `embedder`; records
    /// without a title get one derived from the file name. Returns the number
    /// of chunks loaded.
    pub async fn load_jsonl(&self, path: &Path, embedder: &dyn EmbeddingProvider) -> AppResult<usize> {
        let file = tokio::fs::File::open(path).await.map_err(|e| {
            AppError::Config(format!("Failed to open chunk file {:?}: {}", path, e))
        })?;

        let mut lines = BufReader::new(file).lines();
        let mut line_num = 0usize;
        let mut loaded = 0usize;
        let mut embedded = 0usize;

        while let Some(line) = lines.next_line().await? {
            line_num += 1;
            if line.trim().is_empty() {
                continue;
            }

            let record: ChunkRecord = serde_json::from_str(&line).map_err(|e| {
                AppError::Serialization(format!(
                    "Failed to parse line {} in {:?}: {}",
                    line_num, path, e
                ))
            })?;

            let embedding = match record.embedding {
                Some(embedding) => embedding,
                None => {
                    embedded += 1;
                    embedder.embed(&record.content).await?
                }
            };

            let document_title = record
                .document_title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| title_from_path(&record.document_path));

            self.insert(Chunk {
                chunk_id: record
                    .chunk_id
                    .unwrap_or_else(|| format!("{}#{}", record.document_path, line_num)),
                document_path: record.document_path,
                document_title,
                content: record.content,
                embedding,
            })
            .await;
            loaded += 1;
        }

        tracing::info!(
            "Loaded {} chunks from {:?} ({} embedded on load)",
            loaded,
            path,
            embedded
        );
        Ok(loaded)
    }
}

#[async_trait]
impl ChunkStore for InMemoryChunkStore {
    async fn chunks(&self) -> AppResult<Vec<StoredChunk>> {
        Ok(self.state.read().await.chunks.clone())
    }

    async fn document_title(&self, path: &str) -> AppResult<Option<String>> {
        let state = self.state.read().await;
        Ok(state.documents.get(path).map(|(title, _)| title.clone()))
    }
}

/// Derive a readable title from a document path.
///
/// `docs/getting-started_guide.md` becomes `Getting Started Guide`.
pub fn title_from_path(path: &str) -> String {
    let file_name = path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path);

    let stem = match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    };

    stem.split(['-', '_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingProvider;
    use std::io::Write;

    fn chunk(id: &str, path: &str) -> Chunk {
        Chunk {
            chunk_id: id.to_string(),
            document_path: path.to_string(),
            document_title: format!("Title of {}", path),
            content: format!("content {}", id),
            embedding: vec![1.0, 0.0],
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_chunk_index_per_document() {
        let store = InMemoryChunkStore::new();
        store
            .insert_many(vec![
                chunk("a1", "a.md"),
                chunk("b1", "b.md"),
                chunk("a2", "a.md"),
            ])
            .await;

        let chunks = store.chunks().await.unwrap();
        let indexes: Vec<(&str, u32)> = chunks
            .iter()
            .map(|c| (c.chunk.chunk_id.as_str(), c.chunk_index))
            .collect();

        assert_eq!(indexes, vec![("a1", 0), ("b1", 0), ("a2", 1)]);
    }

    #[tokio::test]
    async fn test_document_title_lookup() {
        let store = InMemoryChunkStore::new();
        store.insert(chunk("a1", "docs/a.md")).await;

        assert_eq!(
            store.document_title("docs/a.md").await.unwrap(),
            Some("Title of docs/a.md".to_string())
        );
        assert_eq!(store.document_title("missing.md").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_load_jsonl_embeds_missing_vectors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"chunkId":"c1","documentPath":"docs/guide.md","documentTitle":"Guide","content":"install steps","embedding":[0.5,0.5,0.0,0.0]}}"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(
            file,
            r#"{{"documentPath":"docs/user_manual.md","content":"configure the retriever"}}"#
        )
        .unwrap();

        let store = InMemoryChunkStore::new();
        let embedder = HashingProvider::new(4);
        let loaded = store.load_jsonl(file.path(), &embedder).await.unwrap();

        assert_eq!(loaded, 2);
        let chunks = store.chunks().await.unwrap();
        assert_eq!(chunks[0].chunk.embedding, vec![0.5, 0.5, 0.0, 0.0]);
        assert_eq!(chunks[1].chunk.document_title, "User Manual");
        assert_eq!(chunks[1].chunk.chunk_id, "docs/user_manual.md#3");
        assert_eq!(chunks[1].chunk.embedding.len(), 4);
    }

    #[tokio::test]
    async fn test_load_jsonl_reports_bad_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();

        let store = InMemoryChunkStore::new();
        let embedder = HashingProvider::new(4);
        let err = store.load_jsonl(file.path(), &embedder).await.unwrap_err();

        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_title_from_path() {
        assert_eq!(title_from_path("docs/getting-started_guide.md"), "Getting Started Guide");
        assert_eq!(title_from_path("README"), "README");
        assert_eq!(title_from_path("notes/.hidden"), ".hidden");
        assert_eq!(title_from_path("docs/руководство.md"), "Руководство");
    }
}
