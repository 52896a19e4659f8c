//! Batch citation quality analysis.
//!
//! Runs a list of questions through the answering path with no history and
//! reports how often answers cite sources and how many of those citations
//! survive validation.

use crate::pipeline::ChatPipeline;
use futures::stream::{self, StreamExt};
use grounded_core::{AppError, AppResult, Citation};
use grounded_knowledge::FilterStrategy;
use serde::Serialize;
use std::sync::Arc;

/// Upper bound on questions per run.
pub const MAX_QUESTIONS: usize = 20;

const DEFAULT_CONCURRENCY: usize = 4;

/// Outcome for a single question.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationTestResult {
    pub question: String,
    pub has_citations: bool,
    /// Citations found in the answer, valid or not
    pub citations_count: usize,
    pub valid_citations_count: usize,
    pub answer: String,
    /// Valid citations only
    pub citations: Vec<Citation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CitationTestResult {
    fn failed(question: String, error: &AppError) -> Self {
        Self {
            question,
            has_citations: false,
            citations_count: 0,
            valid_citations_count: 0,
            answer: String::new(),
            citations: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    fn without_hallucinations(&self) -> bool {
        self.citations_count > 0 && self.valid_citations_count == self.citations_count
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationTestReport {
    pub total_questions: usize,
    pub questions_with_citations: usize,
    pub average_citations_per_answer: f32,
    pub valid_citations_percentage: f32,
    /// Answers with at least one citation, all of them valid. Answers without
    /// citations are not counted
    pub answers_without_hallucinations: usize,
    pub results: Vec<CitationTestResult>,
}

impl CitationTestReport {
    pub fn from_results(results: Vec<CitationTestResult>) -> Self {
        let total_questions = results.len();
        let questions_with_citations = results.iter().filter(|r| r.has_citations).count();
        let parsed: usize = results.iter().map(|r| r.citations_count).sum();
        let valid: usize = results.iter().map(|r| r.valid_citations_count).sum();
        let answers_without_hallucinations =
            results.iter().filter(|r| r.without_hallucinations()).count();

        let average_citations_per_answer = if total_questions == 0 {
            0.0
        } else {
            parsed as f32 / total_questions as f32
        };
        let valid_citations_percentage = if parsed == 0 {
            0.0
        } else {
            valid as f32 / parsed as f32 * 100.0
        };

        Self {
            total_questions,
            questions_with_citations,
            average_citations_per_answer,
            valid_citations_percentage,
            answers_without_hallucinations,
            results,
        }
    }
}

/// Runs citation tests against a chat pipeline.
pub struct CitationAnalyzer {
    pipeline: Arc<ChatPipeline>,
    concurrency: usize,
}

impl CitationAnalyzer {
    pub fn new(pipeline: Arc<ChatPipeline>) -> Self {
        Self {
            pipeline,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Number of questions answered at the same time (at least 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Answer every question and aggregate citation metrics.
    ///
    /// Results come back in input order. A question that fails is recorded
    /// with its error and counted as an answer without citations.
    pub async fn run_citation_test(
        &self,
        questions: &[String],
        top_k: usize,
        min_similarity: f32,
        filter_strategy: Option<FilterStrategy>,
    ) -> AppResult<CitationTestReport> {
        if questions.is_empty() {
            return Err(AppError::InvalidInput(
                "Citation test needs at least one question".to_string(),
            ));
        }
        if questions.len() > MAX_QUESTIONS {
            return Err(AppError::InvalidInput(format!(
                "Citation test accepts at most {} questions, got {}",
                MAX_QUESTIONS,
                questions.len()
            )));
        }

        let strategy = filter_strategy.unwrap_or(self.pipeline.settings().filter_strategy);
        tracing::info!(
            "Running citation test: {} questions, filter '{}', concurrency {}",
            questions.len(),
            strategy,
            self.concurrency
        );

        let results: Vec<CitationTestResult> = stream::iter(questions.iter().cloned())
            .map(|question| async move {
                self.test_question(question, top_k, min_similarity, strategy)
                    .await
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let report = CitationTestReport::from_results(results);
        tracing::info!(
            "Citation test finished: {}/{} answers cited sources, {:.1}% of citations valid",
            report.questions_with_citations,
            report.total_questions,
            report.valid_citations_percentage
        );

        Ok(report)
    }

    async fn test_question(
        &self,
        question: String,
        top_k: usize,
        min_similarity: f32,
        strategy: FilterStrategy,
    ) -> CitationTestResult {
        match self
            .pipeline
            .answer(&question, &[], top_k, min_similarity, strategy)
            .await
        {
            Ok(answer) => {
                let citations_count = answer.citations.parsed_count();
                CitationTestResult {
                    question,
                    has_citations: citations_count > 0,
                    citations_count,
                    valid_citations_count: answer.citations.valid.len(),
                    answer: answer.content,
                    citations: answer.citations.valid,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!("Citation test question failed: {}", e);
                CitationTestResult::failed(question, &e)
            }
        }
    }
}
