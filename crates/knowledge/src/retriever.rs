//! Similarity retrieval over the chunk store.

use crate::embeddings::EmbeddingProvider;
use crate::store::ChunkStore;
use crate::types::RetrievedChunk;
use grounded_core::{AppError, AppResult};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Embeds a query and ranks stored chunks by cosine similarity.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn ChunkStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    pub fn new(store: Arc<dyn ChunkStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    pub fn store(&self) -> &Arc<dyn ChunkStore> {
        &self.store
    }

    /// Return up to `top_k` chunks with similarity at or above
    /// `min_similarity`, ordered by similarity descending.
    ///
    /// Ties keep store insertion order. An empty store yields an empty list.
    #[instrument(skip(self, query), fields(query_len = query.len(), top_k, min_similarity))]
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        min_similarity: f32,
    ) -> AppResult<Vec<RetrievedChunk>> {
        if top_k == 0 {
            return Err(AppError::InvalidInput("top_k must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&min_similarity) {
            return Err(AppError::InvalidInput(format!(
                "min_similarity must be within [0, 1], got {}",
                min_similarity
            )));
        }
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput("Query must not be empty".to_string()));
        }

        let query_embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to embed query: {}", e)))?;

        let stored = self
            .store
            .chunks()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to read chunk store: {}", e)))?;

        let mut skipped = 0usize;
        let mut scored: Vec<RetrievedChunk> = Vec::with_capacity(stored.len());

        for entry in stored {
            if entry.chunk.embedding.len() != query_embedding.len() {
                skipped += 1;
                continue;
            }

            let similarity = cosine_similarity(&query_embedding, &entry.chunk.embedding);
            if similarity >= min_similarity {
                scored.push(RetrievedChunk {
                    chunk: entry.chunk,
                    similarity,
                    chunk_index: entry.chunk_index,
                });
            }
        }

        if skipped > 0 {
            warn!(
                "Skipped {} chunks with embedding dimensions different from the query ({})",
                skipped,
                query_embedding.len()
            );
        }

        // sort_by is stable, so equal scores keep insertion order
        scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        scored.truncate(top_k);

        debug!("Retrieved {} chunks", scored.len());
        Ok(scored)
    }
}

/// Cosine similarity of two equal-length vectors.
///
/// Returns 0.0 when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}
