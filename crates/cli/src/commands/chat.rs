//! Chat command handler.
//!
//! Answers one question, or reads questions from stdin and answers them in a
//! single session until EOF or `exit`.

use super::runtime::{build_runtime, ChatRuntime};
use clap::Args;
use grounded_core::{config::AppConfig, AppResult};
use grounded_knowledge::FilterStrategy;
use grounded_prompt::HistoryStrategy;
use grounded_rag::{SessionStore, TurnOutcome, TurnRequest};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Ask questions about the corpus
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Question to ask. Starts an interactive session when omitted
    pub question: Option<String>,

    /// JSONL file with the indexed chunks
    #[arg(long)]
    pub corpus: PathBuf,

    /// Number of chunks to retrieve
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Similarity floor for retrieval (0.0-1.0)
    #[arg(long)]
    pub min_similarity: Option<f32>,

    /// Context filter strategy (none, threshold, reranker, hybrid)
    #[arg(long)]
    pub filter: Option<String>,

    /// History strategy (sliding, token_limit, none)
    #[arg(long)]
    pub history: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ChatCommand {
    /// Execute the chat command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command");
        tracing::debug!("Chat command options: {:?}", self);

        let runtime = build_runtime(config, &self.corpus).await?;
        let session_id = runtime.sessions.create_session().await?;

        match &self.question {
            Some(question) => self.ask(&runtime, &session_id, question).await,
            None => self.interactive(&runtime, &session_id).await,
        }
    }

    async fn interactive(&self, runtime: &ChatRuntime, session_id: &str) -> AppResult<()> {
        tracing::info!("Interactive session {}", session_id);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            if !self.json {
                eprint!("> ");
                std::io::stderr().flush()?;
            }

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let question = line.trim();
            if question.is_empty() {
                continue;
            }
            if matches!(question, "exit" | "quit") {
                break;
            }

            // A failed turn leaves the session as it was, so keep going
            if let Err(e) = self.ask(runtime, session_id, question).await {
                tracing::error!("Turn failed: {}", e);
                eprintln!("Error: {}", e);
            }
        }

        Ok(())
    }

    async fn ask(&self, runtime: &ChatRuntime, session_id: &str, question: &str) -> AppResult<()> {
        let outcome = runtime
            .pipeline
            .process_turn_detailed(self.request(runtime, session_id, question))
            .await?;

        if self.json {
            let json = serde_json::to_string_pretty(&turn_json(session_id, &outcome))?;
            println!("{}", json);
        } else {
            print_answer(&outcome);
        }

        Ok(())
    }

    fn request(&self, runtime: &ChatRuntime, session_id: &str, question: &str) -> TurnRequest {
        let mut request = TurnRequest::new(runtime.pipeline.settings(), session_id, question);
        if let Some(top_k) = self.top_k {
            request.top_k = top_k;
        }
        if let Some(min_similarity) = self.min_similarity {
            request.min_similarity = min_similarity;
        }
        request.filter_strategy = self.filter.as_deref().map(FilterStrategy::parse_or_default);
        request.history_strategy = self.history.as_deref().map(HistoryStrategy::parse_or_default);
        request
    }
}

fn print_answer(outcome: &TurnOutcome) {
    println!("{}", outcome.message.content);

    let citations = &outcome.message.citations;
    if !citations.is_empty() {
        println!();
        println!("Sources:");
        for citation in citations {
            println!("  - {} ({})", citation.document_title, citation.document_path);
        }
    }

    let rejected = &outcome.answer.citations.rejected;
    if !rejected.is_empty() {
        tracing::warn!(
            "{} citation(s) removed because they were not in the context",
            rejected.len()
        );
    }
}

fn turn_json(session_id: &str, outcome: &TurnOutcome) -> serde_json::Value {
    let answer = &outcome.answer;
    serde_json::json!({
        "sessionId": session_id,
        "answer": outcome.message.content,
        "mode": answer.mode.as_str(),
        "citations": outcome.message.citations,
        "rejectedCitations": answer
            .citations
            .rejected
            .iter()
            .map(|c| c.path.as_str())
            .collect::<Vec<_>>(),
        "filter": answer.filter,
        "history": outcome.history,
        "usage": answer.usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        chat: ChatCommand,
    }

    #[test]
    fn test_parse_single_question() {
        let cli = TestCli::parse_from([
            "grounded",
            "How do I install it?",
            "--corpus",
            "chunks.jsonl",
            "--filter",
            "hybrid",
            "--top-k",
            "3",
        ]);

        assert_eq!(cli.chat.question.as_deref(), Some("How do I install it?"));
        assert_eq!(cli.chat.corpus, PathBuf::from("chunks.jsonl"));
        assert_eq!(cli.chat.filter.as_deref(), Some("hybrid"));
        assert_eq!(cli.chat.top_k, Some(3));
        assert!(!cli.chat.json);
    }

    #[test]
    fn test_corpus_is_required() {
        assert!(TestCli::try_parse_from(["grounded", "question"]).is_err());
    }
}
