//! Citation parser.
//!
//! Recognizes three citation forms, tried in this order:
//! 1. Markdown links: `[Источник: Guide](docs/guide.md)`
//! 2. Numbered references: `[1] Guide (docs/guide.md)` or `[1] docs/guide.md`
//! 3. Plain mentions: `Источник: Guide docs/guide.md` or `Source: docs/guide.md`
//!
//! A span matched by an earlier form is never matched again by a later one.

use super::{is_path_like, normalize_path, ParsedCitation};
use grounded_core::{AppError, AppResult};
use grounded_knowledge::store::title_from_path;
use regex::Regex;
use std::collections::HashSet;

const MARKDOWN_PATTERN: &str =
    r"(?i)\[(?:Источник|Source)\s*:\s*([^\]\n]*?)\s*\]\(\s*([^)\s]+)\s*\)";

const NUMBERED_PATTERN: &str =
    r"\[\d{1,3}\]\s*(?:([^\[\]()\n]*?)\s*\(\s*([^)\s]+)\s*\)|([^\s\[\]()]+))";

const PLAIN_PATTERN: &str = r"(?i)\b(?:Источник|Source)\s*:[ \t]*([^\n\]]*)";

const LEADING_PUNCT: &[char] = &['"', '\'', '«', '`', '(', '['];
const TRAILING_PUNCT: &[char] = &['.', ',', ';', ':', '!', '?', '"', '\'', '»', '`', ')', ']'];

/// A match before title fallback and deduplication.
struct Candidate {
    start: usize,
    end: usize,
    title: Option<String>,
    path: String,
}

/// Extracts citations from generated answers.
#[derive(Debug, Clone)]
pub struct CitationParser {
    markdown: Regex,
    numbered: Regex,
    plain: Regex,
    token: Regex,
}

impl CitationParser {
    pub fn new() -> AppResult<Self> {
        Ok(Self {
            markdown: compile(MARKDOWN_PATTERN)?,
            numbered: compile(NUMBERED_PATTERN)?,
            plain: compile(PLAIN_PATTERN)?,
            token: compile(r"\S+")?,
        })
    }

    /// Parse every citation in `answer`.
    ///
    /// One citation per document path: when a path is cited more than once,
    /// the match from the earliest form wins. Results are ordered by position.
    pub fn parse(&self, answer: &str) -> Vec<ParsedCitation> {
        let families = [
            self.markdown_candidates(answer),
            self.numbered_candidates(answer),
            self.plain_candidates(answer),
        ];

        let mut claimed: Vec<(usize, usize)> = Vec::new();
        let mut found: Vec<ParsedCitation> = Vec::new();

        for candidates in families {
            let mut spans = Vec::with_capacity(candidates.len());
            for candidate in candidates {
                if overlaps(&claimed, candidate.start, candidate.end) {
                    continue;
                }
                spans.push((candidate.start, candidate.end));
                found.push(finish(answer, candidate));
            }
            claimed.extend(spans);
        }

        let mut seen = HashSet::new();
        let mut citations: Vec<ParsedCitation> = found
            .into_iter()
            .filter(|c| seen.insert(normalize_path(&c.path).to_string()))
            .collect();
        citations.sort_by_key(|c| c.start);

        tracing::debug!("Parsed {} citations from answer", citations.len());
        citations
    }

    fn markdown_candidates(&self, answer: &str) -> Vec<Candidate> {
        self.markdown
            .captures_iter(answer)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let path = caps.get(2)?.as_str();
                Some(Candidate {
                    start: whole.start(),
                    end: whole.end(),
                    title: caps.get(1).map(|t| t.as_str().to_string()),
                    path: path.to_string(),
                })
            })
            .collect()
    }

    fn numbered_candidates(&self, answer: &str) -> Vec<Candidate> {
        self.numbered
            .captures_iter(answer)
            .filter_map(|caps| {
                let whole = caps.get(0)?;

                if let Some(path) = caps.get(2) {
                    let path = path.as_str();
                    if !is_path_like(path) {
                        return None;
                    }
                    return Some(Candidate {
                        start: whole.start(),
                        end: whole.end(),
                        title: caps.get(1).map(|t| t.as_str().trim().to_string()),
                        path: path.to_string(),
                    });
                }

                let bare = caps.get(3)?;
                let (offset, token) = trim_token(bare.as_str());
                if !is_path_like(token) {
                    return None;
                }
                Some(Candidate {
                    start: whole.start(),
                    end: bare.start() + offset + token.len(),
                    title: None,
                    path: token.to_string(),
                })
            })
            .collect()
    }

    fn plain_candidates(&self, answer: &str) -> Vec<Candidate> {
        self.plain
            .captures_iter(answer)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let rest = caps.get(1)?;

                // The first path-like word is the path; anything before it is the title
                self.token.find_iter(rest.as_str()).find_map(|word| {
                    let (offset, token) = trim_token(word.as_str());
                    if !is_path_like(token) {
                        return None;
                    }
                    let title = rest.as_str()[..word.start()]
                        .trim()
                        .trim_end_matches([',', '-', ':', '–', '—'])
                        .trim();
                    Some(Candidate {
                        start: whole.start(),
                        end: rest.start() + word.start() + offset + token.len(),
                        title: Some(title.to_string()),
                        path: token.to_string(),
                    })
                })
            })
            .collect()
    }
}

fn compile(pattern: &str) -> AppResult<Regex> {
    Regex::new(pattern)
        .map_err(|e| AppError::Other(format!("Invalid citation pattern '{}': {}", pattern, e)))
}

/// Strip surrounding punctuation from a word; returns the byte offset of the
/// kept part and the kept part.
fn trim_token(word: &str) -> (usize, &str) {
    let without_leading = word.trim_start_matches(LEADING_PUNCT);
    let offset = word.len() - without_leading.len();
    (offset, without_leading.trim_end_matches(TRAILING_PUNCT))
}

fn overlaps(claimed: &[(usize, usize)], start: usize, end: usize) -> bool {
    claimed.iter().any(|&(s, e)| start < e && s < end)
}

fn finish(answer: &str, candidate: Candidate) -> ParsedCitation {
    let title = candidate
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| title_from_path(&candidate.path));

    ParsedCitation {
        text: answer[candidate.start..candidate.end].to_string(),
        title,
        path: candidate.path,
        start: candidate.start,
        end: candidate.end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(answer: &str) -> Vec<ParsedCitation> {
        CitationParser::new().unwrap().parse(answer)
    }

    fn paths(citations: &[ParsedCitation]) -> Vec<&str> {
        citations.iter().map(|c| c.path.as_str()).collect()
    }

    #[test]
    fn test_markdown_citation() {
        let answer = "Установка описана в руководстве [Источник: Guide](docs/guide.md).";
        let citations = parse(answer);

        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].path, "docs/guide.md");
        assert_eq!(citations[0].title, "Guide");
        assert_eq!(citations[0].text, "[Источник: Guide](docs/guide.md)");
        assert_eq!(&answer[citations[0].start..citations[0].end], citations[0].text);
    }

    #[test]
    fn test_markdown_source_alias_and_case() {
        let citations = parse("See [source: API Reference](docs/api.md)");
        assert_eq!(paths(&citations), vec!["docs/api.md"]);
        assert_eq!(citations[0].title, "API Reference");
    }

    #[test]
    fn test_numbered_citations() {
        let answer = "Steps are listed below.\n[1] Setup Guide (docs/setup.md)\n[2] docs/api-keys.md.";
        let citations = parse(answer);

        assert_eq!(paths(&citations), vec!["docs/setup.md", "docs/api-keys.md"]);
        assert_eq!(citations[0].title, "Setup Guide");
        assert_eq!(citations[1].title, "Api Keys");
        assert_eq!(citations[1].text, "[2] docs/api-keys.md");
    }

    #[test]
    fn test_numbered_requires_path_like_token() {
        assert!(parse("[1] see the section above").is_empty());
        assert!(parse("[1] Wikipedia (2020)").is_empty());
    }

    #[test]
    fn test_plain_citations() {
        let citations = parse("Источник: Config Reference docs/config.md\nSource: notes/faq.txt");

        assert_eq!(paths(&citations), vec!["docs/config.md", "notes/faq.txt"]);
        assert_eq!(citations[0].title, "Config Reference");
        assert_eq!(citations[1].title, "Faq");
    }

    #[test]
    fn test_plain_citation_with_bracketed_path() {
        let answer = "Источник: Руководство (docs/guide.md).\nSource: FAQ [notes/faq.txt]";
        let citations = parse(answer);

        assert_eq!(paths(&citations), vec!["docs/guide.md", "notes/faq.txt"]);
        assert_eq!(citations[0].title, "Руководство");
        assert_eq!(citations[0].text, "Источник: Руководство (docs/guide.md");
        assert_eq!(citations[1].title, "FAQ");
    }

    #[test]
    fn test_earlier_form_claims_span() {
        // The plain pattern would also match inside the markdown link
        let citations = parse("[Источник: Guide](docs/guide.md)");
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].text, "[Источник: Guide](docs/guide.md)");
    }

    #[test]
    fn test_dedupe_keeps_earliest_form() {
        let answer = "[1] docs/guide.md is the start. Later: [Источник: Guide](docs/guide.md)";
        let citations = parse(answer);

        assert_eq!(citations.len(), 1);
        assert!(citations[0].text.starts_with("[Источник"));
    }

    #[test]
    fn test_dedupe_normalizes_slashes() {
        let citations = parse("[Источник: A](docs/a.md) and [Источник: A](/docs/a.md/)");
        assert_eq!(citations.len(), 1);
    }

    #[test]
    fn test_results_ordered_by_position() {
        let answer = "Source: docs/first.md\nThen [Источник: Second](docs/second.md)";
        let citations = parse(answer);

        assert_eq!(paths(&citations), vec!["docs/first.md", "docs/second.md"]);
        assert!(citations[0].start < citations[1].start);
    }

    #[test]
    fn test_markdown_round_trip_counts_distinct_paths() {
        let docs = ["docs/a.md", "docs/b.md", "guides/c.md"];
        let mut answer = String::new();
        for i in 0..9 {
            let path = docs[i % docs.len()];
            answer.push_str(&format!("Fact {} [Источник: Doc {}]({}). ", i, i, path));
        }

        let citations = parse(&answer);
        assert_eq!(citations.len(), docs.len());
    }

    #[test]
    fn test_no_citations() {
        assert!(parse("Rust is a systems programming language.").is_empty());
        assert!(parse("").is_empty());
    }
}
