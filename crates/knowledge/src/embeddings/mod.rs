//! Query and chunk embedding.
//!
//! Embedding computation is an external concern; this module only defines the
//! provider seam and ships an Ollama adapter plus an offline hashing embedder.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
pub use providers::{HashingProvider, OllamaProvider};
