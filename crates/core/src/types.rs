//! Chat types shared across the workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A reference from an answer to a source document.
///
/// Citations that reach a caller always point at a document that was part of
/// the context shown to the generator for that turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    /// The span of answer text that matched
    pub text: String,

    /// Path of the cited document
    pub document_path: String,

    /// Human-readable document title
    pub document_title: String,

    /// Chunk the citation resolved to, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
}

/// A single persisted chat message. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a user message stamped with a fresh id and the current time.
    pub fn user(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(session_id, MessageRole::User, content, Vec::new())
    }

    /// Create an assistant reply carrying its validated citations.
    pub fn assistant(
        session_id: impl Into<String>,
        content: impl Into<String>,
        citations: Vec<Citation>,
    ) -> Self {
        Self::new(session_id, MessageRole::Assistant, content, citations)
    }

    fn new(
        session_id: impl Into<String>,
        role: MessageRole,
        content: impl Into<String>,
        citations: Vec<Citation>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            role,
            content: content.into(),
            citations,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_has_no_citations() {
        let msg = ChatMessage::user("s1", "hello");
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.session_id, "s1");
        assert!(msg.citations.is_empty());
        assert!(!msg.id.is_empty());
    }

    #[test]
    fn test_message_ids_are_unique() {
        let a = ChatMessage::user("s1", "a");
        let b = ChatMessage::user("s1", "a");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_citation_serializes_camel_case() {
        let citation = Citation {
            text: "[Источник: Guide](docs/guide.md)".to_string(),
            document_path: "docs/guide.md".to_string(),
            document_title: "Guide".to_string(),
            chunk_id: None,
        };

        let json = serde_json::to_value(&citation).unwrap();
        assert_eq!(json["documentPath"], "docs/guide.md");
        assert!(json.get("chunkId").is_none());
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&MessageRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }
}
