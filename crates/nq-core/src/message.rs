//! Workflow message: the single message type routed between steps.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One result row, keyed by column name in query column order.
pub type ResultRow = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Status {
    Init,
    SchemaSelected,
    Success,
    SyntaxError,
    SemanticError,
    EmptyResult,
    Timeout,
}

impl Status {
    /// Statuses that carry an error message.
    pub fn is_error(self) -> bool {
        matches!(
            self,
            Status::SyntaxError | Status::SemanticError | Status::Timeout
        )
    }

    /// Statuses that carry result rows.
    pub fn has_rows(self) -> bool {
        matches!(self, Status::Success | Status::EmptyResult)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Init => "Init",
            Status::SchemaSelected => "SchemaSelected",
            Status::Success => "Success",
            Status::SyntaxError => "SyntaxError",
            Status::SemanticError => "SemanticError",
            Status::EmptyResult => "EmptyResult",
            Status::Timeout => "Timeout",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RetryContext
// ---------------------------------------------------------------------------

/// Two independent bounded retry counters. Counters only ever increase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryContext {
    pub syntax_retry_count: u32,
    pub semantic_retry_count: u32,
    pub max_syntax_retries: u32,
    pub max_semantic_retries: u32,
}

impl RetryContext {
    pub fn new(max_syntax_retries: u32, max_semantic_retries: u32) -> Self {
        Self {
            syntax_retry_count: 0,
            semantic_retry_count: 0,
            max_syntax_retries,
            max_semantic_retries,
        }
    }
}

impl Default for RetryContext {
    fn default() -> Self {
        Self::new(2, 2)
    }
}

// ---------------------------------------------------------------------------
// WorkflowMessage
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("status {0} must not carry result rows")]
    UnexpectedRows(Status),
    #[error("status {0} requires result rows")]
    MissingRows(Status),
    #[error("status {0} requires an error message")]
    MissingError(Status),
    #[error("status {0} must not carry an error message")]
    UnexpectedError(Status),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowMessage {
    /// User question, carried unchanged end to end.
    pub question: String,

    /// Selected database; empty until schema selection completes
    /// (or pre-filled by the caller).
    pub database: String,

    /// Most recent generated SQL.
    pub sql: Option<String>,

    pub status: Status,

    /// Only set when `status` is Success or EmptyResult.
    pub result_rows: Option<Vec<ResultRow>>,

    /// Set iff `status` is SyntaxError, SemanticError or Timeout.
    pub error_message: Option<String>,

    pub retry_context: RetryContext,

    pub confidence: Option<f64>,
    pub reasoning: Option<String>,

    pub selected_tables: Option<Vec<String>>,

    /// Reference into the run state's schema contexts.
    pub schema_id: Option<String>,

    #[serde(default)]
    pub execution_time_ms: f64,
    #[serde(default)]
    pub row_count: usize,
}

impl WorkflowMessage {
    /// Initial message for a run.
    pub fn init(
        question: impl Into<String>,
        database: Option<String>,
        selected_tables: Option<Vec<String>>,
        retry_context: RetryContext,
    ) -> Self {
        Self {
            question: question.into(),
            database: database.unwrap_or_default(),
            sql: None,
            status: Status::Init,
            result_rows: None,
            error_message: None,
            retry_context,
            confidence: None,
            reasoning: None,
            selected_tables: selected_tables.filter(|t| !t.is_empty()),
            schema_id: None,
            execution_time_ms: 0.0,
            row_count: 0,
        }
    }

    /// Schema selection finished: a fresh message pointing at a new schema context.
    pub fn schema_selected(
        &self,
        database: impl Into<String>,
        selected_tables: Option<Vec<String>>,
        schema_id: impl Into<String>,
        confidence: Option<f64>,
        reasoning: Option<String>,
    ) -> Self {
        Self {
            question: self.question.clone(),
            database: database.into(),
            sql: None,
            status: Status::SchemaSelected,
            result_rows: None,
            error_message: None,
            retry_context: self.retry_context,
            confidence,
            reasoning,
            selected_tables: selected_tables.filter(|t| !t.is_empty()),
            schema_id: Some(schema_id.into()),
            execution_time_ms: 0.0,
            row_count: 0,
        }
    }

    /// Execution produced rows (Success) or none (EmptyResult).
    pub fn executed(
        &self,
        sql: impl Into<String>,
        rows: Vec<ResultRow>,
        confidence: f64,
        reasoning: impl Into<String>,
        execution_time_ms: f64,
    ) -> Self {
        let status = if rows.is_empty() {
            Status::EmptyResult
        } else {
            Status::Success
        };
        Self {
            question: self.question.clone(),
            database: self.database.clone(),
            sql: Some(sql.into()),
            status,
            row_count: rows.len(),
            result_rows: Some(rows),
            error_message: None,
            retry_context: self.retry_context,
            confidence: Some(confidence),
            reasoning: Some(reasoning.into()),
            selected_tables: self.selected_tables.clone(),
            schema_id: self.schema_id.clone(),
            execution_time_ms,
        }
    }

    /// A failed attempt. `status` must be one of the error statuses.
    pub fn failed(
        &self,
        status: Status,
        sql: Option<String>,
        error_message: impl Into<String>,
        confidence: Option<f64>,
        reasoning: Option<String>,
        execution_time_ms: f64,
    ) -> Self {
        debug_assert!(status.is_error(), "failed() called with {status}");
        Self {
            question: self.question.clone(),
            database: self.database.clone(),
            sql,
            status,
            result_rows: None,
            error_message: Some(error_message.into()),
            retry_context: self.retry_context,
            confidence,
            reasoning,
            selected_tables: self.selected_tables.clone(),
            schema_id: self.schema_id.clone(),
            execution_time_ms,
            row_count: 0,
        }
    }

    /// Check that the populated fields agree with `status`.
    pub fn validate(&self) -> Result<(), MessageError> {
        match (self.status.has_rows(), self.result_rows.is_some()) {
            (false, true) => return Err(MessageError::UnexpectedRows(self.status)),
            (true, false) => return Err(MessageError::MissingRows(self.status)),
            _ => {}
        }
        match (self.status.is_error(), self.error_message.is_some()) {
            (true, false) => Err(MessageError::MissingError(self.status)),
            (false, true) => Err(MessageError::UnexpectedError(self.status)),
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
