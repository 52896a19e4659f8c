//! Token counting.
//!
//! History budgeting needs a deterministic, pure token count per message.

/// Counts tokens in a piece of text. Must be deterministic.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Character-ratio estimate used when no tokenizer is available.
///
/// Counts Unicode scalar values, not bytes, so Cyrillic text is not
/// over-counted.
#[derive(Debug, Clone, Copy)]
pub struct ApproxTokenCounter {
    chars_per_token: usize,
}

impl ApproxTokenCounter {
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }
}

impl Default for ApproxTokenCounter {
    fn default() -> Self {
        Self::new(4)
    }
}

impl TokenCounter for ApproxTokenCounter {
    fn count(&self, text: &str) -> usize {
        let chars = text.chars().count();
        if chars == 0 {
            return 0;
        }
        chars.div_ceil(self.chars_per_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_is_zero() {
        assert_eq!(ApproxTokenCounter::default().count(""), 0);
    }

    #[test]
    fn test_rounds_up() {
        let counter = ApproxTokenCounter::default();
        assert_eq!(counter.count("abc"), 1);
        assert_eq!(counter.count("abcd"), 1);
        assert_eq!(counter.count("abcde"), 2);
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        let counter = ApproxTokenCounter::new(1);
        assert_eq!(counter.count("привет"), 6);
    }

    #[test]
    fn test_zero_ratio_clamped() {
        let counter = ApproxTokenCounter::new(0);
        assert_eq!(counter.count("ab"), 2);
    }
}
