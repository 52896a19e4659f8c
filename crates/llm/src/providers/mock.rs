//! Scripted LLM provider for tests and offline runs.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use grounded_core::{AppError, AppResult};
use std::collections::VecDeque;
use std::sync::Mutex;

type Responder = Box<dyn Fn(&LlmRequest) -> AppResult<String> + Send + Sync>;

/// Mock client that replays queued replies, then falls back to a responder.
///
/// Every request is recorded so tests can inspect the prompts that were sent.
pub struct MockClient {
    queue: Mutex<VecDeque<AppResult<String>>>,
    responder: Responder,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockClient {
    /// A client that answers every request with an empty string.
    pub fn new() -> Self {
        Self::with_responder(|_| Ok(String::new()))
    }

    /// A client that computes each reply from the request.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&LlmRequest) -> AppResult<String> + Send + Sync + 'static,
    {
        Self {
            queue: Mutex::new(VecDeque::new()),
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful reply.
    pub fn push_reply(&self, reply: impl Into<String>) -> &Self {
        self.lock_queue().push_back(Ok(reply.into()));
        self
    }

    /// Queue a generation failure.
    pub fn push_error(&self, message: impl Into<String>) -> &Self {
        self.lock_queue()
            .push_back(Err(AppError::Generation(message.into())));
        self
    }

    /// Snapshot of every request received so far.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<AppResult<String>>> {
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmClient for MockClient {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let queued = self.lock_queue().pop_front();
        let content = match queued {
            Some(reply) => reply?,
            None => (self.responder)(request)?,
        };

        let prompt_chars: usize = request.messages.iter().map(|m| m.content.len()).sum();
        let usage = LlmUsage::new((prompt_chars / 4) as u32, (content.len() / 4) as u32);

        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            usage,
        })
    }
}
