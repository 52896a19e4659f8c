//! LLM provider factory.
//!
//! Builds an LLM client from the provider name and endpoint found in the
//! application configuration.

use crate::client::LlmClient;
use crate::providers::{MockClient, OllamaClient};
use grounded_core::{AppError, AppResult};
use std::sync::Arc;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama", "mock")
/// * `endpoint` - Optional custom endpoint URL
/// * `timeout_secs` - Optional request timeout
///
/// # Errors
/// Returns `AppError::Config` for unknown providers.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    timeout_secs: Option<u64>,
) -> AppResult<Arc<dyn LlmClient>> {
    match provider.to_lowercase().as_str() {
        "ollama" => {
            let base_url = endpoint.unwrap_or("http://localhost:11434");
            let client = match timeout_secs {
                Some(secs) => OllamaClient::with_timeout(base_url, secs)?,
                None => OllamaClient::with_base_url(base_url),
            };
            Ok(Arc::new(client))
        }
        "mock" => {
            tracing::warn!("Using mock LLM provider; answers will be empty");
            Ok(Arc::new(MockClient::new()))
        }
        _ => Err(AppError::Config(format!("Unknown provider: {}", provider))),
    }
}
