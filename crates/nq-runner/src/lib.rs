//! nq-runner: NL2SQL workflow engine with bounded retry loops, parallel post-processing, and streaming events.

pub mod aggregate;
pub mod context;
pub mod events;
pub mod format;
pub mod reviewer;
pub mod steps;
pub mod success;
pub mod workflow;

pub use aggregate::{aggregate_success_results, BranchResult};
pub use context::RunContext;
pub use workflow::{Nl2SqlWorkflow, WorkflowInput};

use nq_catalog::CatalogError;
use nq_llm::LlmError;
use nq_policy::PolicyError;
use thiserror::Error;

/// Errors that abort a run. Recoverable failures never surface here; they
/// travel in `WorkflowMessage::status`.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("workflow aborted: {0}")]
    Fatal(String),
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("llm error: {0}")]
    Llm(#[from] LlmError),
    #[error("invalid configuration: {0}")]
    Config(#[from] PolicyError),
}

/// Identifiers attached to streaming events, one per step.
pub mod executor_ids {
    pub const INITIALIZE_CONTEXT: &str = "initialize_context";
    pub const SCHEMA_UNDERSTANDING: &str = "schema_understanding";
    pub const SQL_GENERATION: &str = "sql_generation";
    pub const SQL_REVIEWER: &str = "sql_reviewer";
    pub const HANDLE_SUCCESS: &str = "handle_success";
    pub const EVALUATE_SQL_REASONING: &str = "evaluate_sql_reasoning";
    pub const GENERATE_NATURAL_LANGUAGE_RESPONSE: &str = "generate_natural_language_response";
    pub const AGGREGATE_SUCCESS_RESULTS: &str = "aggregate_success_results";
}
