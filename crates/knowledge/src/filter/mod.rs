//! Context filtering between retrieval and prompt assembly.
//!
//! A filter pass takes the retrieved chunks for a query and decides which of
//! them reach the generator. Every dropped chunk is reported with a reason so
//! callers can explain why a document was not used.
//!
//! # Strategies
//! - `none`: passthrough
//! - `threshold`: similarity floor with an optional cap on kept chunks
//! - `reranker`: one batched LLM call scores every chunk for relevance
//! - `hybrid`: threshold first, then reranker over the survivors

pub mod reranker;
pub mod threshold;

use crate::types::{average_similarity, RetrievedChunk};
use grounded_core::config::FilterSettings;
use grounded_llm::LlmClient;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

pub use reranker::LlmReranker;
pub use threshold::apply_threshold;

/// Context filter strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStrategy {
    None,
    Threshold,
    Reranker,
    Hybrid,
}

impl FilterStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterStrategy::None => "none",
            FilterStrategy::Threshold => "threshold",
            FilterStrategy::Reranker => "reranker",
            FilterStrategy::Hybrid => "hybrid",
        }
    }

    /// Parse a strategy name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "none" => Some(FilterStrategy::None),
            "threshold" => Some(FilterStrategy::Threshold),
            "reranker" => Some(FilterStrategy::Reranker),
            "hybrid" => Some(FilterStrategy::Hybrid),
            _ => None,
        }
    }

    /// Parse a strategy name, falling back to `None` for unknown names.
    pub fn parse_or_default(name: &str) -> Self {
        Self::parse(name).unwrap_or_else(|| {
            tracing::warn!(
                "Unknown filter strategy '{}', falling back to 'none'",
                name
            );
            FilterStrategy::None
        })
    }
}

impl fmt::Display for FilterStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunables shared by all strategies.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    /// Similarity floor for the threshold stage
    pub min_similarity: f32,

    /// Keep at most this many chunks after the threshold stage
    pub keep_top: Option<usize>,

    /// Chunks beyond this position are not sent to the reranker
    pub max_chunks: usize,

    /// Minimum rerank score (0-10) for a chunk to be used
    pub rerank_min_score: f32,
}

impl FilterConfig {
    pub fn from_settings(settings: &FilterSettings) -> Self {
        Self {
            min_similarity: settings.min_similarity,
            keep_top: settings.keep_top,
            max_chunks: settings.max_chunks,
            rerank_min_score: settings.rerank_min_score,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self::from_settings(&FilterSettings::default())
    }
}

/// Why a chunk did not survive filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    BelowThreshold,
    ExceedsKeepTop,
    ExceedsMaxChunks,
    RerankRejected,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::BelowThreshold => "below_threshold",
            DropReason::ExceedsKeepTop => "exceeds_keep_top",
            DropReason::ExceedsMaxChunks => "exceeds_max_chunks",
            DropReason::RerankRejected => "rerank_rejected",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedChunk {
    pub chunk_id: String,
    pub document_path: String,
    pub similarity: f32,
    pub reason: DropReason,
}

impl DroppedChunk {
    pub(crate) fn new(chunk: &RetrievedChunk, reason: DropReason) -> Self {
        Self {
            chunk_id: chunk.chunk_id().to_string(),
            document_path: chunk.document_path().to_string(),
            similarity: chunk.similarity,
            reason,
        }
    }
}

/// Per-pass filter statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterStats {
    pub retrieved: usize,
    pub kept: usize,
    pub dropped: Vec<DroppedChunk>,
    pub avg_similarity_before: f32,
    pub avg_similarity_after: f32,
}

/// Reranker verdict for one chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RerankDecision {
    pub chunk_id: String,
    pub rerank_score: f32,
    pub reason: String,
    pub should_use: bool,
}

#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub kept: Vec<RetrievedChunk>,
    pub stats: FilterStats,
    /// Empty unless a reranking stage ran
    pub decisions: Vec<RerankDecision>,
}

impl FilterOutcome {
    fn build(
        retrieved: &[RetrievedChunk],
        kept: Vec<RetrievedChunk>,
        dropped: Vec<DroppedChunk>,
        decisions: Vec<RerankDecision>,
    ) -> Self {
        let stats = FilterStats {
            retrieved: retrieved.len(),
            kept: kept.len(),
            dropped,
            avg_similarity_before: average_similarity(retrieved),
            avg_similarity_after: average_similarity(&kept),
        };

        Self {
            kept,
            stats,
            decisions,
        }
    }
}

/// Applies a filter strategy to retrieved chunks.
#[derive(Clone)]
pub struct ContextFilter {
    reranker: LlmReranker,
    config: FilterConfig,
}

impl ContextFilter {
    /// `client` and `model` are used by the reranking strategies only.
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>, config: FilterConfig) -> Self {
        let reranker = LlmReranker::new(client, model, config.rerank_min_score);
        Self { reranker, config }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Filter `retrieved` for `query`.
    ///
    /// Never fails: reranker errors are absorbed by keeping the affected
    /// chunks.
    pub async fn apply(
        &self,
        query: &str,
        strategy: FilterStrategy,
        retrieved: Vec<RetrievedChunk>,
    ) -> FilterOutcome {
        let mut dropped = Vec::new();
        let mut decisions = Vec::new();

        let kept = match strategy {
            FilterStrategy::None => retrieved.clone(),
            FilterStrategy::Threshold => {
                apply_threshold(retrieved.clone(), &self.config, &mut dropped)
            }
            FilterStrategy::Reranker => {
                let (kept, scored) = self
                    .reranker
                    .rerank(query, retrieved.clone(), self.config.max_chunks, &mut dropped)
                    .await;
                decisions = scored;
                kept
            }
            FilterStrategy::Hybrid => {
                let survivors = apply_threshold(retrieved.clone(), &self.config, &mut dropped);
                let (kept, scored) = self
                    .reranker
                    .rerank(query, survivors, self.config.max_chunks, &mut dropped)
                    .await;
                decisions = scored;
                kept
            }
        };

        let outcome = FilterOutcome::build(&retrieved, kept, dropped, decisions);

        tracing::info!(
            "Filter '{}' kept {}/{} chunks (avg similarity {:.3} -> {:.3})",
            strategy,
            outcome.stats.kept,
            outcome.stats.retrieved,
            outcome.stats.avg_similarity_before,
            outcome.stats.avg_similarity_after
        );
        for drop in &outcome.stats.dropped {
            tracing::debug!(
                "Dropped chunk {} ({}, similarity {:.3}): {}",
                drop.chunk_id,
                drop.document_path,
                drop.similarity,
                drop.reason
            );
        }

        outcome
    }
}
