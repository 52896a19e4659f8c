//! LLM relevance reranking.
//!
//! All candidate chunks are scored in a single JSON-mode completion. The model
//! answers with `{"scores":[{"index":0,"score":7,"reason":"..."}]}` on a 0-10
//! scale. Anything that goes wrong keeps the affected chunks (fail-open).

use super::{DropReason, DroppedChunk, RerankDecision};
use crate::types::RetrievedChunk;
use grounded_llm::{LlmClient, LlmMessage, LlmRequest};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

const MAX_SCORE: f32 = 10.0;

/// Characters of chunk content shown to the reranker.
const MAX_EXCERPT_CHARS: usize = 1200;

pub const REASON_PARSE_FAILED: &str = "rerank_parse_failed";
pub const REASON_CALL_FAILED: &str = "rerank_call_failed";
pub const REASON_MISSING_SCORE: &str = "rerank_missing_score";

const SYSTEM_PROMPT: &str = "You rate how useful document excerpts are for answering a question.\n\
Score each excerpt from 0 (irrelevant) to 10 (directly answers the question).\n\
Respond with JSON only, in this exact shape:\n\
{\"scores\":[{\"index\":0,\"score\":7,\"reason\":\"short justification\"}]}\n\
Include one entry per excerpt, using the excerpt numbers given.";

#[derive(Debug, Deserialize)]
struct ScoreEntry {
    index: usize,
    score: f32,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScoreResponse {
    Wrapped { scores: Vec<ScoreEntry> },
    Bare(Vec<ScoreEntry>),
}

/// Scores chunks with one batched generator call.
#[derive(Clone)]
pub struct LlmReranker {
    client: Arc<dyn LlmClient>,
    model: String,
    min_score: f32,
}

impl LlmReranker {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>, min_score: f32) -> Self {
        Self {
            client,
            model: model.into(),
            min_score,
        }
    }

    /// Rerank `chunks` for `query`.
    ///
    /// Chunks past `max_chunks` are dropped unscored. Scored chunks below the
    /// minimum score are dropped as rejected. Kept chunks come back ordered by
    /// rerank score, highest first; equal scores keep their input order.
    pub async fn rerank(
        &self,
        query: &str,
        mut chunks: Vec<RetrievedChunk>,
        max_chunks: usize,
        dropped: &mut Vec<DroppedChunk>,
    ) -> (Vec<RetrievedChunk>, Vec<RerankDecision>) {
        if chunks.len() > max_chunks {
            for chunk in chunks.drain(max_chunks..) {
                dropped.push(DroppedChunk::new(&chunk, DropReason::ExceedsMaxChunks));
            }
        }

        if chunks.is_empty() {
            return (chunks, Vec::new());
        }

        let decisions = match self.request_scores(query, &chunks).await {
            Ok(content) => match parse_scores(&content) {
                Some(scores) => self.decide(&chunks, &scores),
                None => {
                    tracing::warn!(
                        "Could not parse reranker response, keeping all {} chunks",
                        chunks.len()
                    );
                    fail_open(&chunks, REASON_PARSE_FAILED)
                }
            },
            Err(e) => {
                tracing::warn!("Reranker call failed, keeping all chunks: {}", e);
                fail_open(&chunks, REASON_CALL_FAILED)
            }
        };

        let mut kept: Vec<(f32, RetrievedChunk)> = Vec::with_capacity(chunks.len());
        for (chunk, decision) in chunks.into_iter().zip(&decisions) {
            if decision.should_use {
                kept.push((decision.rerank_score, chunk));
            } else {
                dropped.push(DroppedChunk::new(&chunk, DropReason::RerankRejected));
            }
        }

        kept.sort_by(|a, b| b.0.total_cmp(&a.0));

        (kept.into_iter().map(|(_, chunk)| chunk).collect(), decisions)
    }

    async fn request_scores(
        &self,
        query: &str,
        chunks: &[RetrievedChunk],
    ) -> grounded_core::AppResult<String> {
        let mut prompt = format!("Question: {}\n\nExcerpts:\n", query);
        for (i, chunk) in chunks.iter().enumerate() {
            prompt.push_str(&format!(
                "\n[{}] {} ({})\n{}\n",
                i,
                chunk.document_title(),
                chunk.document_path(),
                excerpt(chunk.content())
            ));
        }

        let request = LlmRequest::new(
            vec![LlmMessage::system(SYSTEM_PROMPT), LlmMessage::user(prompt)],
            self.model.clone(),
        )
        .with_temperature(0.0)
        .with_json_mode();

        tracing::debug!("Reranking {} chunks with model {}", chunks.len(), self.model);
        let response = self.client.complete(&request).await?;
        Ok(response.content)
    }

    fn decide(
        &self,
        chunks: &[RetrievedChunk],
        scores: &HashMap<usize, (f32, String)>,
    ) -> Vec<RerankDecision> {
        chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| match scores.get(&i) {
                Some((score, reason)) => RerankDecision {
                    chunk_id: chunk.chunk_id().to_string(),
                    rerank_score: *score,
                    reason: reason.clone(),
                    should_use: *score >= self.min_score,
                },
                None => RerankDecision {
                    chunk_id: chunk.chunk_id().to_string(),
                    rerank_score: 0.0,
                    reason: REASON_MISSING_SCORE.to_string(),
                    should_use: true,
                },
            })
            .collect()
    }
}

fn fail_open(chunks: &[RetrievedChunk], reason: &str) -> Vec<RerankDecision> {
    chunks
        .iter()
        .map(|chunk| RerankDecision {
            chunk_id: chunk.chunk_id().to_string(),
            rerank_score: 0.0,
            reason: reason.to_string(),
            should_use: true,
        })
        .collect()
}

fn excerpt(content: &str) -> &str {
    match content.char_indices().nth(MAX_EXCERPT_CHARS) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}

/// Parse a reranker reply into `index -> (score, reason)`.
///
/// Accepts the wrapped object or a bare array, optionally inside a markdown
/// code fence. Scores are clamped to 0-10; non-finite scores are ignored and
/// the first entry wins for a repeated index.
fn parse_scores(content: &str) -> Option<HashMap<usize, (f32, String)>> {
    let body = strip_code_fence(content.trim());
    let response: ScoreResponse = serde_json::from_str(body).ok()?;

    let entries = match response {
        ScoreResponse::Wrapped { scores } => scores,
        ScoreResponse::Bare(scores) => scores,
    };

    let mut scores = HashMap::with_capacity(entries.len());
    for entry in entries {
        if !entry.score.is_finite() {
            continue;
        }
        scores
            .entry(entry.index)
            .or_insert((entry.score.clamp(0.0, MAX_SCORE), entry.reason));
    }

    Some(scores)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Skip an optional language tag on the opening fence line
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::retrieved;
    use grounded_llm::MockClient;

    fn chunks(n: usize) -> Vec<RetrievedChunk> {
        (0..n)
            .map(|i| retrieved(&format!("c{}", i), &format!("docs/{}.md", i), 0.9))
            .collect()
    }

    fn reranker(client: Arc<MockClient>) -> LlmReranker {
        LlmReranker::new(client, "mock-model", 5.0)
    }

    #[test]
    fn test_parse_wrapped_and_fenced() {
        let content = "```json\n{\"scores\":[{\"index\":1,\"score\":7.5,\"reason\":\"ok\"}]}\n```";
        let scores = parse_scores(content).unwrap();
        assert_eq!(scores.get(&1), Some(&(7.5, "ok".to_string())));
    }

    #[test]
    fn test_parse_bare_array_and_clamp() {
        let scores = parse_scores(r#"[{"index":0,"score":14},{"index":0,"score":2}]"#).unwrap();
        assert_eq!(scores.get(&0).map(|s| s.0), Some(10.0));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_scores("I think excerpt 2 is best").is_none());
        assert!(parse_scores(r#"{"result": "fine"}"#).is_none());
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        let text = "ж".repeat(MAX_EXCERPT_CHARS + 10);
        assert_eq!(excerpt(&text).chars().count(), MAX_EXCERPT_CHARS);
    }

    #[tokio::test]
    async fn test_parse_failure_fails_open() {
        let client = Arc::new(MockClient::new());
        client.push_reply("not json at all");
        let mut dropped = Vec::new();

        let (kept, decisions) = reranker(client)
            .rerank("q", chunks(3), 10, &mut dropped)
            .await;

        assert_eq!(kept.len(), 3);
        assert!(dropped.is_empty());
        assert!(decisions
            .iter()
            .all(|d| d.should_use && d.reason == REASON_PARSE_FAILED));
    }

    #[tokio::test]
    async fn test_missing_score_kept_after_scored() {
        let client = Arc::new(MockClient::new());
        client.push_reply(r#"{"scores":[{"index":1,"score":8,"reason":"relevant"}]}"#);
        let mut dropped = Vec::new();

        let (kept, decisions) = reranker(client)
            .rerank("q", chunks(2), 10, &mut dropped)
            .await;

        let ids: Vec<&str> = kept.iter().map(|c| c.chunk_id()).collect();
        assert_eq!(ids, vec!["c1", "c0"]);
        assert_eq!(decisions[0].reason, REASON_MISSING_SCORE);
        assert!(decisions[0].should_use);
    }

    #[tokio::test]
    async fn test_empty_input_skips_call() {
        let client = Arc::new(MockClient::new());
        let mut dropped = Vec::new();

        let (kept, decisions) = reranker(client.clone())
            .rerank("q", Vec::new(), 10, &mut dropped)
            .await;

        assert!(kept.is_empty());
        assert!(decisions.is_empty());
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_prompt_lists_every_candidate() {
        let client = Arc::new(MockClient::new());
        client.push_reply(r#"{"scores":[]}"#);
        let mut dropped = Vec::new();

        reranker(client.clone())
            .rerank("how do I install", chunks(2), 10, &mut dropped)
            .await;

        let requests = client.requests();
        let user = &requests[0].messages[1].content;
        assert!(user.contains("how do I install"));
        assert!(user.contains("[0] docs/0.md (docs/0.md)"));
        assert!(user.contains("[1] docs/1.md (docs/1.md)"));
    }
}
