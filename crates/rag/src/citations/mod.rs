//! Citation extraction and validation.
//!
//! The parser finds every place an answer claims a source; the validator keeps
//! only the claims that point at a document the generator was actually shown.

pub mod parser;
pub mod validator;

use serde::Serialize;

pub use parser::CitationParser;
pub use validator::{CitationValidation, CitationValidator};

/// A citation found in answer text, before validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedCitation {
    /// Matched answer text
    pub text: String,
    pub title: String,
    pub path: String,
    /// Byte offset of the match in the answer
    pub start: usize,
    /// Byte offset one past the end of the match
    pub end: usize,
}

/// Canonical form used to compare document paths.
pub fn normalize_path(path: &str) -> &str {
    path.trim().trim_matches('/')
}

/// Whether a token plausibly names a document: it contains a `/` or ends in a
/// file extension of 2-8 alphanumeric characters.
pub fn is_path_like(token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    if token.contains('/') {
        return true;
    }

    match token.rsplit_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty()
                && (2..=8).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
                && ext.chars().any(|c| c.is_ascii_alphabetic())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(" /docs/guide.md/ "), "docs/guide.md");
        assert_eq!(normalize_path("docs/guide.md"), "docs/guide.md");
    }

    #[test]
    fn test_is_path_like() {
        assert!(is_path_like("docs/guide.md"));
        assert!(is_path_like("README.md"));
        assert!(is_path_like("docs/faq"));
        assert!(!is_path_like("Setup"));
        assert!(!is_path_like("e.g"));
        assert!(!is_path_like("3.14"));
        assert!(!is_path_like(""));
    }
}
