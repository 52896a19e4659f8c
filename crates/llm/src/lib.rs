//! LLM integration crate for Grounded.
//!
//! Provides a provider-agnostic abstraction for chat-style text generation,
//! plus token counting used for history budgeting.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **Mock**: Scripted replies for tests and offline runs
//!
//! # Example
//! ```no_run
//! use grounded_llm::{LlmClient, LlmMessage, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new(vec![LlmMessage::user("Hello, world!")], "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod tokens;

// Re-export main types
pub use client::{LlmClient, LlmMessage, LlmRequest, LlmResponse, LlmRole, LlmUsage};
pub use factory::create_client;
pub use providers::{MockClient, OllamaClient};
pub use tokens::{ApproxTokenCounter, TokenCounter};
