//! Command handlers for the Grounded CLI.

pub mod chat;
pub mod citation_test;
mod runtime;

pub use chat::ChatCommand;
pub use citation_test::CitationTestCommand;
