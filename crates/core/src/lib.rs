//! Grounded Core Library
//!
//! This crate provides the foundational utilities for Grounded:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management
//! - Chat types shared by every other crate

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use types::{ChatMessage, Citation, MessageRole};
