//! Prompt types.

use grounded_llm::LlmMessage;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Which answering mode the system prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptMode {
    /// Context chunks are present; citations are mandatory
    Grounded,
    /// No chunks, but prior turns exist; answer from the conversation
    Conversational,
    /// No chunks and no history; answer from general knowledge
    GeneralKnowledge,
}

impl PromptMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptMode::Grounded => "grounded",
            PromptMode::Conversational => "conversational",
            PromptMode::GeneralKnowledge => "general_knowledge",
        }
    }

    /// Whether answers in this mode are expected to carry citations.
    pub fn requires_citations(&self) -> bool {
        matches!(self, PromptMode::Grounded)
    }
}

impl fmt::Display for PromptMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A prompt ready for the generator.
#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    /// System message first, then history, then the question
    pub messages: Vec<LlmMessage>,

    pub mode: PromptMode,

    /// Document paths shown to the generator; citations are checked against
    /// this set
    pub context_paths: BTreeSet<String>,
}

impl AssembledPrompt {
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages.first().map(|m| m.content.as_str())
    }
}
