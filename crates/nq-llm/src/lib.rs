//! nq-llm: LLM boundary with provider clients, two-stage response parsing, prompt templates.

pub mod client;
pub mod error;
pub mod mock;
pub mod parse;
pub mod prompts;
pub mod types;

pub use client::{HttpLlmClient, LlmClient, LlmConfig, LlmProvider, LlmRequest, Purpose};
pub use error::{LlmError, ParseError};
pub use mock::MockLlm;
pub use parse::{extract_string_field, parse_strict};
pub use types::{SchemaSelection, SqlGeneration, StructuredResponse};

/// At most `max` characters of `text`, for log lines.
pub fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
