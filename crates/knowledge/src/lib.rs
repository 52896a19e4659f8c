//! Document knowledge for Grounded.
//!
//! Holds indexed chunks, embeds queries, ranks chunks by similarity and
//! filters the ranked list before it reaches the prompt.

pub mod embeddings;
pub mod filter;
pub mod retriever;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use embeddings::{create_provider, EmbeddingProvider};
pub use filter::{
    ContextFilter, DropReason, DroppedChunk, FilterConfig, FilterOutcome, FilterStats,
    FilterStrategy, RerankDecision,
};
pub use retriever::{cosine_similarity, Retriever};
pub use store::{ChunkStore, InMemoryChunkStore, StoredChunk};
pub use types::{average_similarity, Chunk, RetrievedChunk};
