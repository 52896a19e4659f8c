//! Prompt assembly.
//!
//! Turns a question, the optimized history and the filtered context chunks
//! into the message sequence sent to the generator. The system message is
//! rendered from a Handlebars template so deployments can swap the wording
//! without touching the assembly rules.

use crate::types::{AssembledPrompt, PromptMode};
use grounded_core::{AppError, AppResult, ChatMessage};
use grounded_knowledge::RetrievedChunk;
use grounded_llm::LlmMessage;
use handlebars::Handlebars;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

const SYSTEM_TEMPLATE_NAME: &str = "system";

/// Default system prompt template.
///
/// Variables: `documents` (title, path), `contexts` (index, title, path,
/// similarity, content), and the mode flags `grounded`, `conversational`,
/// `general` and `multi_document`.
pub const DEFAULT_SYSTEM_TEMPLATE: &str = r#"You are a documentation assistant. Answer the user's question accurately and concisely, in the language of the question.
{{#if documents}}

Available documents:
{{#each documents}}
- {{this.title}} ({{this.path}})
{{/each}}
{{/if}}
{{#if contexts}}

Context:
{{#each contexts}}

[{{this.index}}] {{this.title}} ({{this.path}}), relevance {{this.similarity}}%
{{this.content}}
{{/each}}
{{/if}}

{{#if grounded}}
Citation rules:
- Base the answer on the context above.
- Cite sources in the form [Источник: title](path).
- Use only paths from the list of available documents. Never invent a path.
{{#if multi_document}}
- Cite at least two different documents.
{{/if}}
{{/if}}
{{#if conversational}}
No documents matched this question. Answer from the conversation so far. Citations are not required.
{{/if}}
{{#if general}}
No documents matched this question. Answer from general knowledge and say that the answer is not based on the documentation. Citations are not required.
{{/if}}"#;

#[derive(Debug, Serialize, PartialEq, Eq, PartialOrd, Ord)]
struct DocumentEntry<'a> {
    title: &'a str,
    path: &'a str,
}

#[derive(Debug, Serialize)]
struct ContextBlock<'a> {
    index: usize,
    title: &'a str,
    path: &'a str,
    similarity: String,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct SystemPromptData<'a> {
    documents: Vec<DocumentEntry<'a>>,
    contexts: Vec<ContextBlock<'a>>,
    grounded: bool,
    conversational: bool,
    general: bool,
    multi_document: bool,
}

/// Builds generator prompts.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    handlebars: Handlebars<'static>,
}

impl PromptAssembler {
    /// Assembler with the built-in system template.
    pub fn new() -> AppResult<Self> {
        Self::with_template(DEFAULT_SYSTEM_TEMPLATE)
    }

    /// Assembler with a custom system template.
    pub fn with_template(template: &str) -> AppResult<Self> {
        let mut handlebars = Handlebars::new();

        // Plain text output, no HTML escaping
        handlebars.register_escape_fn(handlebars::no_escape);

        handlebars
            .register_template_string(SYSTEM_TEMPLATE_NAME, template)
            .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

        Ok(Self { handlebars })
    }

    /// Assemble the prompt for one turn.
    ///
    /// `chunks` are shown in the order given. History citations are not
    /// replayed to the generator.
    pub fn assemble(
        &self,
        question: &str,
        history: &[ChatMessage],
        chunks: &[RetrievedChunk],
    ) -> AppResult<AssembledPrompt> {
        self.assemble_with_titles(question, history, chunks, &HashMap::new())
    }

    /// Like [`assemble`](Self::assemble), but documents found in `titles`
    /// (path -> title) are shown under that title instead of the chunk's own.
    pub fn assemble_with_titles(
        &self,
        question: &str,
        history: &[ChatMessage],
        chunks: &[RetrievedChunk],
        titles: &HashMap<String, String>,
    ) -> AppResult<AssembledPrompt> {
        let mode = if !chunks.is_empty() {
            PromptMode::Grounded
        } else if !history.is_empty() {
            PromptMode::Conversational
        } else {
            PromptMode::GeneralKnowledge
        };

        let context_paths: BTreeSet<String> = chunks
            .iter()
            .map(|c| c.document_path().to_string())
            .collect();

        let system = self.render_system(mode, chunks, titles, context_paths.len())?;

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(LlmMessage::system(system));
        messages.extend(history.iter().map(|m| LlmMessage {
            role: m.role.into(),
            content: m.content.clone(),
        }));
        messages.push(LlmMessage::user(question));

        tracing::debug!(
            "Assembled {} prompt: {} messages, {} context chunks from {} documents",
            mode,
            messages.len(),
            chunks.len(),
            context_paths.len()
        );

        Ok(AssembledPrompt {
            messages,
            mode,
            context_paths,
        })
    }

    fn render_system(
        &self,
        mode: PromptMode,
        chunks: &[RetrievedChunk],
        titles: &HashMap<String, String>,
        distinct_documents: usize,
    ) -> AppResult<String> {
        let documents: Vec<DocumentEntry> = chunks
            .iter()
            .map(|c| DocumentEntry {
                title: resolved_title(titles, c),
                path: c.document_path(),
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let contexts = chunks
            .iter()
            .enumerate()
            .map(|(i, c)| ContextBlock {
                index: i + 1,
                title: resolved_title(titles, c),
                path: c.document_path(),
                similarity: format!("{:.0}", c.similarity * 100.0),
                content: c.content(),
            })
            .collect();

        let data = SystemPromptData {
            documents,
            contexts,
            grounded: mode == PromptMode::Grounded,
            conversational: mode == PromptMode::Conversational,
            general: mode == PromptMode::GeneralKnowledge,
            multi_document: distinct_documents >= 2,
        };

        let rendered = self
            .handlebars
            .render(SYSTEM_TEMPLATE_NAME, &data)
            .map_err(|e| AppError::Prompt(format!("Failed to render system prompt: {}", e)))?;

        Ok(rendered.trim().to_string())
    }
}

fn resolved_title<'a>(titles: &'a HashMap<String, String>, chunk: &'a RetrievedChunk) -> &'a str {
    titles
        .get(chunk.document_path())
        .map(String::as_str)
        .unwrap_or_else(|| chunk.document_title())
}
