//! Grounded chat core.
//!
//! Wires retrieval, context filtering, prompt assembly and generation into
//! chat turns whose citations are checked against the context the generator
//! was shown.
//!
//! # Example
//! ```no_run
//! use grounded_core::AppConfig;
//! use grounded_knowledge::{create_provider, InMemoryChunkStore, Retriever};
//! use grounded_llm::{create_client, ApproxTokenCounter};
//! use grounded_rag::{ChatPipeline, InMemorySessionStore, PipelineSettings, SessionStore, TurnRequest};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load()?;
//! let embedder = create_provider(&config.embedding)?;
//! let store = Arc::new(InMemoryChunkStore::new());
//! store.load_jsonl(Path::new("chunks.jsonl"), embedder.as_ref()).await?;
//!
//! let sessions = Arc::new(InMemorySessionStore::new());
//! let settings = PipelineSettings::from_config(&config);
//! let pipeline = ChatPipeline::new(
//!     Retriever::new(store, embedder),
//!     create_client(&config.provider, config.provider_endpoint(), None)?,
//!     sessions.clone(),
//!     Arc::new(ApproxTokenCounter::default()),
//!     settings.clone(),
//! )?;
//!
//! let session_id = sessions.create_session().await?;
//! let reply = pipeline
//!     .process_turn(TurnRequest::new(&settings, session_id, "How do I install it?"))
//!     .await?;
//! println!("{}", reply.content);
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod citations;
pub mod pipeline;
pub mod session;

#[cfg(test)]
mod tests;

pub use analyzer::{CitationAnalyzer, CitationTestReport, CitationTestResult, MAX_QUESTIONS};
pub use citations::{CitationParser, CitationValidation, CitationValidator, ParsedCitation};
pub use pipeline::{ChatPipeline, GroundedAnswer, PipelineSettings, TurnOutcome, TurnRequest};
pub use session::{InMemorySessionStore, SessionStore};
