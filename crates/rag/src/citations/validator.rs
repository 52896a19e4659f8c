//! Citation validation against the context shown to the generator.

use super::{normalize_path, ParsedCitation};
use grounded_core::Citation;
use grounded_knowledge::RetrievedChunk;
use std::collections::HashMap;

/// Result of validating one answer's citations.
#[derive(Debug, Clone, Default)]
pub struct CitationValidation {
    /// Citations that point at a context document, with authoritative titles
    pub valid: Vec<Citation>,
    /// Citations to documents the generator never saw
    pub rejected: Vec<ParsedCitation>,
}

impl CitationValidation {
    pub fn parsed_count(&self) -> usize {
        self.valid.len() + self.rejected.len()
    }

    /// True when at least one citation was found and all of them validated.
    pub fn fully_grounded(&self) -> bool {
        !self.valid.is_empty() && self.rejected.is_empty()
    }
}

struct ContextDocument<'a> {
    path: &'a str,
    title: &'a str,
    chunk_id: &'a str,
}

/// Checks citations against the documents of one turn's context.
pub struct CitationValidator<'a> {
    documents: HashMap<&'a str, ContextDocument<'a>>,
}

impl<'a> CitationValidator<'a> {
    /// Index the context chunks by normalized document path. When a document
    /// contributed several chunks, the first one in context order is used.
    pub fn new(context: &'a [RetrievedChunk]) -> Self {
        let mut documents = HashMap::new();
        for chunk in context {
            documents
                .entry(normalize_path(chunk.document_path()))
                .or_insert_with(|| ContextDocument {
                    path: chunk.document_path(),
                    title: chunk.document_title(),
                    chunk_id: chunk.chunk_id(),
                });
        }
        Self { documents }
    }

    pub fn validate(&self, parsed: Vec<ParsedCitation>) -> CitationValidation {
        let mut validation = CitationValidation::default();

        for citation in parsed {
            match self.documents.get(normalize_path(&citation.path)) {
                Some(doc) => validation.valid.push(Citation {
                    text: citation.text,
                    document_path: doc.path.to_string(),
                    document_title: doc.title.to_string(),
                    chunk_id: Some(doc.chunk_id.to_string()),
                }),
                None => {
                    tracing::warn!(
                        "Potential hallucination: citation to '{}' is not in the provided context",
                        citation.path
                    );
                    validation.rejected.push(citation);
                }
            }
        }

        validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::citations::CitationParser;
    use grounded_knowledge::Chunk;
    use std::sync::Arc;

    fn context_chunk(id: &str, path: &str, title: &str) -> RetrievedChunk {
        RetrievedChunk {
            chunk: Arc::new(Chunk {
                chunk_id: id.to_string(),
                document_path: path.to_string(),
                document_title: title.to_string(),
                content: String::new(),
                embedding: Vec::new(),
            }),
            similarity: 0.8,
            chunk_index: 0,
        }
    }

    fn check(answer: &str, context: &[RetrievedChunk]) -> CitationValidation {
        let parsed = CitationParser::new().unwrap().parse(answer);
        CitationValidator::new(context).validate(parsed)
    }

    #[test]
    fn test_citation_in_context_is_valid() {
        let context = vec![context_chunk("g1", "docs/guide.md", "User Guide")];
        let result = check("Do this [Источник: Guide](docs/guide.md)", &context);

        assert_eq!(result.valid.len(), 1);
        assert!(result.rejected.is_empty());
        assert!(result.fully_grounded());

        let citation = &result.valid[0];
        assert_eq!(citation.document_path, "docs/guide.md");
        assert_eq!(citation.document_title, "User Guide");
        assert_eq!(citation.chunk_id.as_deref(), Some("g1"));
    }

    #[test]
    fn test_citation_outside_context_is_rejected() {
        let context = vec![context_chunk("o1", "docs/other.md", "Other")];
        let result = check("Do this [Источник: Guide](docs/guide.md)", &context);

        assert!(result.valid.is_empty());
        assert_eq!(result.rejected.len(), 1);
        assert_eq!(result.parsed_count(), 1);
        assert!(!result.fully_grounded());
    }

    #[test]
    fn test_plain_citation_with_bracketed_path_is_valid() {
        let context = vec![context_chunk("g1", "docs/guide.md", "Guide")];
        let result = check("Источник: Руководство (docs/guide.md)", &context);

        assert_eq!(result.valid.len(), 1);
        assert!(result.rejected.is_empty());
        assert_eq!(result.valid[0].document_path, "docs/guide.md");
    }

    #[test]
    fn test_path_normalization() {
        let context = vec![context_chunk("g1", "docs/guide.md", "Guide")];
        let result = check("[Источник: Guide](/docs/guide.md/)", &context);
        assert_eq!(result.valid.len(), 1);
        assert_eq!(result.valid[0].document_path, "docs/guide.md");
    }

    #[test]
    fn test_first_context_chunk_wins() {
        let context = vec![
            context_chunk("best", "docs/guide.md", "Guide"),
            context_chunk("other", "docs/guide.md", "Guide"),
        ];
        let result = check("[1] docs/guide.md", &context);
        assert_eq!(result.valid[0].chunk_id.as_deref(), Some("best"));
    }

    #[test]
    fn test_valid_paths_are_subset_of_context() {
        let context = vec![
            context_chunk("a", "docs/a.md", "A"),
            context_chunk("b", "docs/b.md", "B"),
        ];
        let answer = "[Источник: A](docs/a.md) [Источник: X](docs/x.md) [2] docs/b.md Source: y/z.md";
        let result = check(answer, &context);

        assert_eq!(result.parsed_count(), 4);
        assert!(result
            .valid
            .iter()
            .all(|c| c.document_path == "docs/a.md" || c.document_path == "docs/b.md"));
        assert_eq!(result.valid.len(), 2);
    }

    #[test]
    fn test_empty_context_rejects_everything() {
        let result = check("[Источник: A](docs/a.md)", &[]);
        assert!(result.valid.is_empty());
        assert_eq!(result.rejected.len(), 1);
    }
}
