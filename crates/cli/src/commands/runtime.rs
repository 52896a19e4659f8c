//! Shared setup for commands that answer questions.

use grounded_core::{config::AppConfig, AppResult};
use grounded_knowledge::{create_provider, InMemoryChunkStore, Retriever};
use grounded_llm::{create_client, ApproxTokenCounter};
use grounded_rag::{ChatPipeline, InMemorySessionStore, PipelineSettings};
use std::path::Path;
use std::sync::Arc;

/// A ready-to-use chat pipeline over one corpus.
pub struct ChatRuntime {
    pub pipeline: Arc<ChatPipeline>,
    pub sessions: Arc<InMemorySessionStore>,
}

/// Load the corpus and build a pipeline from configuration.
pub async fn build_runtime(config: &AppConfig, corpus: &Path) -> AppResult<ChatRuntime> {
    let embedder = create_provider(&config.embedding)?;
    tracing::debug!(
        "Embedding provider: {} ({}, {} dims)",
        embedder.provider_name(),
        embedder.model_name(),
        embedder.dimensions()
    );

    let store = Arc::new(InMemoryChunkStore::new());
    let loaded = store.load_jsonl(corpus, embedder.as_ref()).await?;
    if loaded == 0 {
        tracing::warn!(
            "Corpus {:?} is empty; answers will not be grounded in documents",
            corpus
        );
    }

    let timeout = config
        .get_provider_config(&config.provider)
        .and_then(|pc| pc.timeout);
    let client = create_client(&config.provider, config.provider_endpoint(), timeout)?;

    let sessions = Arc::new(InMemorySessionStore::new());
    let pipeline = ChatPipeline::new(
        Retriever::new(store, embedder),
        client,
        sessions.clone(),
        Arc::new(ApproxTokenCounter::default()),
        PipelineSettings::from_config(config),
    )?;

    Ok(ChatRuntime {
        pipeline: Arc::new(pipeline),
        sessions,
    })
}
