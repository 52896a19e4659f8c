//! Chat turn orchestration.
//!
//! A turn runs retrieval, context filtering, history compaction, prompt
//! assembly, generation and citation validation, then persists the exchange.
//! Nothing is written to the session until every step has succeeded, so a
//! failed or cancelled turn leaves the session untouched.

use crate::citations::{CitationParser, CitationValidation, CitationValidator};
use crate::session::SessionStore;
use grounded_core::{AppConfig, AppResult, ChatMessage};
use grounded_knowledge::{
    ContextFilter, FilterConfig, FilterStats, FilterStrategy, RetrievedChunk, Retriever,
};
use grounded_llm::{LlmClient, LlmRequest, LlmUsage, TokenCounter};
use grounded_prompt::{
    optimize_history, HistoryConfig, HistoryStrategy, OptimizationStats, PromptAssembler,
    PromptMode,
};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// Per-session turn locks, keyed by session id.
type TurnLocks = std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>;

/// Pipeline defaults, usually taken from configuration.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub model: String,
    pub top_k: usize,
    pub min_similarity: f32,
    pub filter_strategy: FilterStrategy,
    pub filter: FilterConfig,
    pub history_strategy: HistoryStrategy,
    pub history: HistoryConfig,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let chat = &config.chat;
        Self {
            model: config.model.clone(),
            top_k: chat.top_k,
            min_similarity: chat.min_similarity,
            filter_strategy: FilterStrategy::parse_or_default(&chat.filter.strategy),
            filter: FilterConfig::from_settings(&chat.filter),
            history_strategy: HistoryStrategy::parse_or_default(&chat.history.strategy),
            history: HistoryConfig::from_settings(&chat.history),
            temperature: chat.temperature,
            max_tokens: chat.max_tokens,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// One user turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub session_id: String,
    pub question: String,
    pub top_k: usize,
    pub min_similarity: f32,
    /// Falls back to the pipeline default when omitted
    pub filter_strategy: Option<FilterStrategy>,
    /// Falls back to the pipeline default when omitted
    pub history_strategy: Option<HistoryStrategy>,
}

impl TurnRequest {
    /// A request using the pipeline's retrieval defaults.
    pub fn new(settings: &PipelineSettings, session_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            question: question.into(),
            top_k: settings.top_k,
            min_similarity: settings.min_similarity,
            filter_strategy: None,
            history_strategy: None,
        }
    }
}

/// A generated answer with its validated citations.
#[derive(Debug, Clone)]
pub struct GroundedAnswer {
    pub content: String,
    pub mode: PromptMode,
    pub citations: CitationValidation,
    pub filter: FilterStats,
    pub usage: LlmUsage,
}

/// Everything a turn produced, for callers that want more than the reply.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The persisted assistant message
    pub message: ChatMessage,
    pub answer: GroundedAnswer,
    pub history: OptimizationStats,
}

/// Runs chat turns against a knowledge store and a generator.
pub struct ChatPipeline {
    retriever: Retriever,
    filter: ContextFilter,
    assembler: PromptAssembler,
    parser: CitationParser,
    client: Arc<dyn LlmClient>,
    sessions: Arc<dyn SessionStore>,
    token_counter: Arc<dyn TokenCounter>,
    settings: PipelineSettings,
    turn_locks: TurnLocks,
}

impl ChatPipeline {
    pub fn new(
        retriever: Retriever,
        client: Arc<dyn LlmClient>,
        sessions: Arc<dyn SessionStore>,
        token_counter: Arc<dyn TokenCounter>,
        settings: PipelineSettings,
    ) -> AppResult<Self> {
        let filter = ContextFilter::new(client.clone(), settings.model.clone(), settings.filter.clone());

        Ok(Self {
            retriever,
            filter,
            assembler: PromptAssembler::new()?,
            parser: CitationParser::new()?,
            client,
            sessions,
            token_counter,
            settings,
            turn_locks: TurnLocks::default(),
        })
    }

    /// Replace the prompt assembler, e.g. to use a custom system template.
    pub fn with_assembler(mut self, assembler: PromptAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Process one turn and return the persisted assistant message.
    pub async fn process_turn(&self, request: TurnRequest) -> AppResult<ChatMessage> {
        Ok(self.process_turn_detailed(request).await?.message)
    }

    /// Process one turn and return the reply together with its statistics.
    #[instrument(skip(self, request), fields(session_id = %request.session_id))]
    pub async fn process_turn_detailed(&self, request: TurnRequest) -> AppResult<TurnOutcome> {
        // Turns on one session run one at a time
        let lease = TurnLease::acquire(&self.turn_locks, &request.session_id);
        let _guard = lease.lock.lock().await;

        let history = self.sessions.history(&request.session_id).await?;

        let filter_strategy = request
            .filter_strategy
            .unwrap_or(self.settings.filter_strategy);
        let history_strategy = request
            .history_strategy
            .unwrap_or(self.settings.history_strategy);

        let optimized = optimize_history(
            &history,
            history_strategy,
            &self.settings.history,
            self.token_counter.as_ref(),
        );

        let answer = self
            .answer(
                &request.question,
                &optimized.messages,
                request.top_k,
                request.min_similarity,
                filter_strategy,
            )
            .await?;

        let user_message = ChatMessage::user(&request.session_id, &request.question);
        let assistant_message = ChatMessage::assistant(
            &request.session_id,
            &answer.content,
            answer.citations.valid.clone(),
        );

        self.sessions.append(&request.session_id, user_message).await?;
        self.sessions
            .append(&request.session_id, assistant_message.clone())
            .await?;

        info!(
            "Turn complete: mode={}, citations {}/{} valid, {} tokens",
            answer.mode,
            answer.citations.valid.len(),
            answer.citations.parsed_count(),
            answer.usage.total_tokens
        );

        Ok(TurnOutcome {
            message: assistant_message,
            answer,
            history: optimized.stats,
        })
    }

    /// Answer a question against already-optimized history without touching
    /// any session.
    pub async fn answer(
        &self,
        question: &str,
        history: &[ChatMessage],
        top_k: usize,
        min_similarity: f32,
        filter_strategy: FilterStrategy,
    ) -> AppResult<GroundedAnswer> {
        let retrieved = self.retriever.retrieve(question, top_k, min_similarity).await?;

        let filtered = self.filter.apply(question, filter_strategy, retrieved).await;

        let titles = self.document_titles(&filtered.kept).await?;
        let prompt = self
            .assembler
            .assemble_with_titles(question, history, &filtered.kept, &titles)?;

        let mut llm_request = LlmRequest::new(prompt.messages, self.settings.model.clone())
            .with_temperature(self.settings.temperature);
        if let Some(max_tokens) = self.settings.max_tokens {
            llm_request = llm_request.with_max_tokens(max_tokens);
        }

        let response = self.client.complete(&llm_request).await?;

        let parsed = self.parser.parse(&response.content);
        let citations = CitationValidator::new(&filtered.kept).validate(parsed);
        if prompt.mode.requires_citations() && !citations.fully_grounded() {
            warn!(
                "Answer is not fully grounded: {} of {} citations valid",
                citations.valid.len(),
                citations.parsed_count()
            );
        }

        Ok(GroundedAnswer {
            content: response.content,
            mode: prompt.mode,
            citations,
            filter: filtered.stats,
            usage: response.usage,
        })
    }

    /// Resolve the store's title for every document in the context.
    async fn document_titles(&self, chunks: &[RetrievedChunk]) -> AppResult<HashMap<String, String>> {
        let store = self.retriever.store();
        let mut titles = HashMap::new();
        for chunk in chunks {
            let path = chunk.document_path();
            if titles.contains_key(path) {
                continue;
            }
            if let Some(title) = store.document_title(path).await? {
                titles.insert(path.to_string(), title);
            }
        }
        Ok(titles)
    }

    /// Number of sessions currently holding or waiting for a turn lock.
    #[cfg(test)]
    pub(crate) fn active_turn_locks(&self) -> usize {
        lock_map(&self.turn_locks).len()
    }
}

fn lock_map(
    locks: &TurnLocks,
) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
    locks.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A handle on one session's turn lock. The map entry is removed when the
/// last handle goes away, including when a turn future is dropped.
struct TurnLease<'a> {
    locks: &'a TurnLocks,
    session_id: String,
    lock: Arc<Mutex<()>>,
}

impl<'a> TurnLease<'a> {
    fn acquire(locks: &'a TurnLocks, session_id: &str) -> Self {
        let lock = lock_map(locks)
            .entry(session_id.to_string())
            .or_default()
            .clone();
        Self {
            locks,
            session_id: session_id.to_string(),
            lock,
        }
    }
}

impl Drop for TurnLease<'_> {
    fn drop(&mut self) {
        let mut locks = lock_map(self.locks);
        let unused = locks
            .get(&self.session_id)
            .is_some_and(|entry| Arc::ptr_eq(entry, &self.lock) && Arc::strong_count(entry) == 2);
        // Only the map and this lease reference the lock
        if unused {
            locks.remove(&self.session_id);
        }
    }
}
