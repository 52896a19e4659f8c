//! Conversation history compaction.
//!
//! Prior turns are trimmed before prompt assembly so long sessions stay within
//! a message-count or token budget. Kept messages are always returned in
//! chronological order.

use grounded_core::config::HistorySettings;
use grounded_core::ChatMessage;
use grounded_llm::TokenCounter;
use serde::Serialize;
use std::fmt;

/// History compaction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStrategy {
    None,
    Sliding,
    TokenLimit,
}

impl HistoryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryStrategy::None => "none",
            HistoryStrategy::Sliding => "sliding",
            HistoryStrategy::TokenLimit => "token_limit",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "none" => Some(HistoryStrategy::None),
            "sliding" => Some(HistoryStrategy::Sliding),
            "token_limit" => Some(HistoryStrategy::TokenLimit),
            _ => None,
        }
    }

    /// Parse a strategy name, falling back to `Sliding` for unknown names.
    pub fn parse_or_default(name: &str) -> Self {
        Self::parse(name).unwrap_or_else(|| {
            tracing::warn!(
                "Unknown history strategy '{}', falling back to 'sliding'",
                name
            );
            HistoryStrategy::Sliding
        })
    }
}

impl fmt::Display for HistoryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryConfig {
    pub max_messages: usize,
    pub max_tokens: usize,
}

impl HistoryConfig {
    pub fn from_settings(settings: &HistorySettings) -> Self {
        Self {
            max_messages: settings.max_messages,
            max_tokens: settings.max_tokens,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self::from_settings(&HistorySettings::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationStats {
    pub original_messages_count: usize,
    pub optimized_messages_count: usize,
    pub original_tokens: usize,
    pub optimized_tokens: usize,
    pub tokens_saved: usize,
}

#[derive(Debug, Clone)]
pub struct OptimizedHistory {
    pub messages: Vec<ChatMessage>,
    pub stats: OptimizationStats,
}

/// Compact `history` with `strategy`.
pub fn optimize_history(
    history: &[ChatMessage],
    strategy: HistoryStrategy,
    config: &HistoryConfig,
    counter: &dyn TokenCounter,
) -> OptimizedHistory {
    let messages: Vec<ChatMessage> = match strategy {
        HistoryStrategy::None => history.to_vec(),
        HistoryStrategy::Sliding => {
            let start = history.len().saturating_sub(config.max_messages);
            history[start..].to_vec()
        }
        HistoryStrategy::TokenLimit => keep_within_tokens(history, config.max_tokens, counter),
    };

    let original_tokens = count_tokens(history, counter);
    let optimized_tokens = count_tokens(&messages, counter);

    let stats = OptimizationStats {
        original_messages_count: history.len(),
        optimized_messages_count: messages.len(),
        original_tokens,
        optimized_tokens,
        tokens_saved: original_tokens.saturating_sub(optimized_tokens),
    };

    if stats.optimized_messages_count < stats.original_messages_count {
        tracing::debug!(
            "History '{}' kept {}/{} messages ({} tokens saved)",
            strategy,
            stats.optimized_messages_count,
            stats.original_messages_count,
            stats.tokens_saved
        );
    }

    OptimizedHistory { messages, stats }
}

/// Walk from newest to oldest, keeping messages while the running total fits.
/// The newest message is always kept, even when it alone is over budget.
fn keep_within_tokens(
    history: &[ChatMessage],
    max_tokens: usize,
    counter: &dyn TokenCounter,
) -> Vec<ChatMessage> {
    let mut total = 0usize;
    let mut start = history.len();

    for (i, message) in history.iter().enumerate().rev() {
        let tokens = counter.count(&message.content);
        if total + tokens > max_tokens {
            if start == history.len() {
                tracing::debug!(
                    "Newest message ({} tokens) exceeds history budget of {}, keeping it alone",
                    tokens,
                    max_tokens
                );
                start = i;
            }
            break;
        }
        total += tokens;
        start = i;
    }

    history[start..].to_vec()
}

fn count_tokens(messages: &[ChatMessage], counter: &dyn TokenCounter) -> usize {
    messages.iter().map(|m| counter.count(&m.content)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use grounded_llm::ApproxTokenCounter;

    /// One token per character.
    fn counter() -> ApproxTokenCounter {
        ApproxTokenCounter::new(1)
    }

    fn conversation(n: usize) -> Vec<ChatMessage> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    ChatMessage::user("s1", format!("question {}", i))
                } else {
                    ChatMessage::assistant("s1", format!("answer {}", i), Vec::new())
                }
            })
            .collect()
    }

    fn sized(lengths: &[usize]) -> Vec<ChatMessage> {
        lengths
            .iter()
            .map(|&len| ChatMessage::user("s1", "x".repeat(len)))
            .collect()
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!(HistoryStrategy::parse("token_limit"), Some(HistoryStrategy::TokenLimit));
        assert_eq!(HistoryStrategy::parse("SLIDING"), Some(HistoryStrategy::Sliding));
        assert_eq!(HistoryStrategy::parse_or_default("summary"), HistoryStrategy::Sliding);
    }

    #[test]
    fn test_none_keeps_everything() {
        let history = conversation(7);
        let result = optimize_history(&history, HistoryStrategy::None, &HistoryConfig::default(), &counter());

        assert_eq!(result.messages, history);
        assert_eq!(result.stats.tokens_saved, 0);
    }

    #[test]
    fn test_sliding_keeps_last_ten_of_twelve() {
        let history = conversation(12);
        let config = HistoryConfig {
            max_messages: 10,
            max_tokens: 2000,
        };

        let result = optimize_history(&history, HistoryStrategy::Sliding, &config, &counter());

        assert_eq!(result.messages.len(), 10);
        assert_eq!(result.messages[..], history[2..]);
        assert_eq!(result.stats.original_messages_count, 12);
        assert_eq!(result.stats.optimized_messages_count, 10);
        assert!(result.stats.tokens_saved > 0);
    }

    #[test]
    fn test_sliding_short_history_unchanged() {
        let history = conversation(3);
        let result = optimize_history(&history, HistoryStrategy::Sliding, &HistoryConfig::default(), &counter());
        assert_eq!(result.messages, history);
    }

    #[test]
    fn test_token_limit_keeps_newest_within_budget() {
        let history = sized(&[40, 30, 20, 10]);
        let config = HistoryConfig {
            max_messages: 10,
            max_tokens: 35,
        };

        let result = optimize_history(&history, HistoryStrategy::TokenLimit, &config, &counter());

        assert_eq!(result.messages[..], history[2..]);
        assert_eq!(result.stats.optimized_tokens, 30);
        assert_eq!(result.stats.tokens_saved, 70);
    }

    #[test]
    fn test_token_limit_oversized_newest_kept_alone() {
        let history = sized(&[5, 5, 500]);
        let config = HistoryConfig {
            max_messages: 10,
            max_tokens: 100,
        };

        let result = optimize_history(&history, HistoryStrategy::TokenLimit, &config, &counter());

        assert_eq!(result.messages.len(), 1);
        assert_eq!(result.messages[0], history[2]);
    }

    #[test]
    fn test_token_limit_budget_holds() {
        let counter = counter();
        let lengths = [12, 7, 31, 3, 18, 25, 9, 14];
        let history = sized(&lengths);

        for max_tokens in [10, 25, 40, 60, 120] {
            let config = HistoryConfig {
                max_messages: 10,
                max_tokens,
            };
            let result = optimize_history(&history, HistoryStrategy::TokenLimit, &config, &counter);

            assert!(!result.messages.is_empty());
            let kept = count_tokens(&result.messages, &counter);
            assert!(
                kept <= max_tokens || result.messages.len() == 1,
                "budget {} exceeded with {} tokens",
                max_tokens,
                kept
            );
            // Kept messages are a chronological suffix
            let start = history.len() - result.messages.len();
            assert_eq!(result.messages[..], history[start..]);
        }
    }

    #[test]
    fn test_empty_history() {
        let config = HistoryConfig::default();
        for strategy in [HistoryStrategy::None, HistoryStrategy::Sliding, HistoryStrategy::TokenLimit] {
            let result = optimize_history(&[], strategy, &config, &counter());
            assert!(result.messages.is_empty());
            assert_eq!(result.stats.original_tokens, 0);
        }
    }
}
