//! Chat session storage.

use async_trait::async_trait;
use grounded_core::{AppError, AppResult, ChatMessage};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Append-only message history per chat session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create an empty session and return its id.
    async fn create_session(&self) -> AppResult<String>;

    /// Append a message to an existing session.
    async fn append(&self, session_id: &str, message: ChatMessage) -> AppResult<()>;

    /// All messages of a session in chronological order.
    async fn history(&self, session_id: &str) -> AppResult<Vec<ChatMessage>>;
}

/// Process-local session store.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(&self) -> AppResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        self.sessions.write().await.insert(id.clone(), Vec::new());
        tracing::debug!("Created chat session {}", id);
        Ok(id)
    }

    async fn append(&self, session_id: &str, message: ChatMessage) -> AppResult<()> {
        let mut sessions = self.sessions.write().await;
        let messages = sessions
            .get_mut(session_id)
            .ok_or_else(|| AppError::SessionNotFound(session_id.to_string()))?;
        messages.push(message);
        Ok(())
    }

    async fn history(&self, session_id: &str) -> AppResult<Vec<ChatMessage>> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| AppError::SessionNotFound(session_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_history() {
        let store = InMemorySessionStore::new();
        let id = store.create_session().await.unwrap();

        store.append(&id, ChatMessage::user(&id, "hello")).await.unwrap();
        store
            .append(&id, ChatMessage::assistant(&id, "hi", Vec::new()))
            .await
            .unwrap();

        let history = store.history(&id).await.unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hello", "hi"]);
    }

    #[tokio::test]
    async fn test_new_session_is_empty() {
        let store = InMemorySessionStore::new();
        let id = store.create_session().await.unwrap();
        assert!(store.history(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let store = InMemorySessionStore::new();

        assert!(matches!(
            store.history("missing").await,
            Err(AppError::SessionNotFound(_))
        ));
        assert!(matches!(
            store.append("missing", ChatMessage::user("missing", "x")).await,
            Err(AppError::SessionNotFound(_))
        ));
    }
}
