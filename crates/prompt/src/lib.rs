//! Prompt construction for Grounded.
//!
//! This crate provides:
//! - History compaction under message or token budgets
//! - Handlebars system prompt rendering
//! - Assembly of the full generator message sequence

pub mod builder;
pub mod history;
pub mod types;

// Re-export main types
pub use builder::{PromptAssembler, DEFAULT_SYSTEM_TEMPLATE};
pub use history::{
    optimize_history, HistoryConfig, HistoryStrategy, OptimizationStats, OptimizedHistory,
};
pub use types::{AssembledPrompt, PromptMode};
