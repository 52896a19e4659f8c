//! Citation test command handler.

use super::runtime::build_runtime;
use clap::Args;
use grounded_core::{config::AppConfig, AppResult};
use grounded_knowledge::FilterStrategy;
use grounded_rag::CitationAnalyzer;
use std::path::{Path, PathBuf};

/// Measure how well answers cite their sources
#[derive(Args, Debug)]
pub struct CitationTestCommand {
    /// JSONL file with the indexed chunks
    #[arg(long)]
    pub corpus: PathBuf,

    /// File with one question per line (blank lines and # comments are skipped)
    #[arg(short, long)]
    pub questions: PathBuf,

    /// Number of chunks to retrieve per question
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Similarity floor for retrieval (0.0-1.0)
    #[arg(long)]
    pub min_similarity: Option<f32>,

    /// Context filter strategy (none, threshold, reranker, hybrid)
    #[arg(long)]
    pub filter: Option<String>,

    /// Questions answered concurrently
    #[arg(long, default_value = "4")]
    pub concurrency: usize,
}

impl CitationTestCommand {
    /// Execute the citation test command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing citation-test command");
        tracing::debug!("Citation test options: {:?}", self);

        let questions = read_questions(&self.questions)?;
        let runtime = build_runtime(config, &self.corpus).await?;
        let settings = runtime.pipeline.settings();

        let report = CitationAnalyzer::new(runtime.pipeline.clone())
            .with_concurrency(self.concurrency)
            .run_citation_test(
                &questions,
                self.top_k.unwrap_or(settings.top_k),
                self.min_similarity.unwrap_or(settings.min_similarity),
                self.filter.as_deref().map(FilterStrategy::parse_or_default),
            )
            .await?;

        let json = serde_json::to_string_pretty(&report)?;
        println!("{}", json);

        Ok(())
    }
}

fn read_questions(path: &Path) -> AppResult<Vec<String>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(parse_questions(&contents))
}

fn parse_questions(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use grounded_core::AppError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_questions_skips_comments() {
        let questions = parse_questions("# install\nHow do I install it?\n\n  Where is the config?  \n");
        assert_eq!(questions, vec!["How do I install it?", "Where is the config?"]);
    }

    #[test]
    fn test_read_questions_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "What is grounded?").unwrap();
        writeln!(file, "# skipped").unwrap();

        let questions = read_questions(file.path()).unwrap();
        assert_eq!(questions, vec!["What is grounded?"]);
    }

    #[test]
    fn test_missing_questions_file() {
        let err = read_questions(Path::new("/nonexistent/questions.txt")).unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
    }
}
