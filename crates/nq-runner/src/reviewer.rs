//! SQL reviewer: routes each execution outcome to approval, one of the two
//! retry loops, or a terminal output.

use crate::RunnerError;
use nq_core::message::{Status, WorkflowMessage};
use nq_core::output::{ExecutionResult, Nl2SqlOutput};
use nq_policy::{can_retry, increment, RetryKind};
use serde::Serialize;

pub const SYNTAX_ERROR_TYPE: &str = "SQL Syntax Error";
pub const SCHEMA_ERROR_TYPE: &str = "Database Schema Error";
pub const EMPTY_RESULT_TYPE: &str = "Empty Result";
pub const TIMEOUT_TYPE: &str = "Query Timeout";

const EMPTY_RESULT_MESSAGE: &str = "Query executed successfully but returned no rows";

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "decision", content = "payload", rename_all = "snake_case")]
pub enum Decision {
    /// Success: continue to the success handler.
    Approve(WorkflowMessage),
    /// Regenerate SQL against the same schema context.
    RetrySql(WorkflowMessage),
    /// Re-run schema selection.
    RetrySchema(WorkflowMessage),
    /// Emit this output and stop.
    Terminate(Nl2SqlOutput),
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Decision::Approve(_) => "approve",
            Decision::RetrySql(_) => "retry_sql",
            Decision::RetrySchema(_) => "retry_schema",
            Decision::Terminate(_) => "terminate",
        }
    }
}

/// Route `msg`. Retry decisions carry the message with its counter bumped.
pub fn review(msg: WorkflowMessage, return_nl: bool) -> Result<Decision, RunnerError> {
    msg.validate()
        .map_err(|e| RunnerError::Fatal(format!("inconsistent workflow message: {e}")))?;

    match msg.status {
        Status::Success => Ok(Decision::Approve(msg)),
        Status::SyntaxError => Ok(retry_or_terminate(
            msg,
            RetryKind::Syntax,
            SYNTAX_ERROR_TYPE,
        )),
        Status::SemanticError => Ok(retry_or_terminate(
            msg,
            RetryKind::Semantic,
            SCHEMA_ERROR_TYPE,
        )),
        Status::EmptyResult | Status::Timeout => {
            tracing::warn!(status = %msg.status, "Execution issue, terminating run");
            Ok(Decision::Terminate(execution_issue_output(&msg, return_nl)))
        }
        Status::Init | Status::SchemaSelected => Err(RunnerError::Fatal(format!(
            "reviewer received a message with status {}",
            msg.status
        ))),
    }
}

fn retry_or_terminate(mut msg: WorkflowMessage, kind: RetryKind, error_type: &str) -> Decision {
    if !can_retry(kind, &msg.retry_context) {
        tracing::warn!(
            ?kind,
            syntax_retries = msg.retry_context.syntax_retry_count,
            semantic_retries = msg.retry_context.semantic_retry_count,
            "Retry budget exhausted"
        );
        return Decision::Terminate(error_output(&msg, error_type));
    }

    msg.retry_context = increment(kind, &msg.retry_context);
    tracing::info!(
        ?kind,
        syntax_retries = msg.retry_context.syntax_retry_count,
        semantic_retries = msg.retry_context.semantic_retry_count,
        error = msg.error_message.as_deref().unwrap_or_default(),
        "Retrying"
    );
    match kind {
        RetryKind::Syntax => Decision::RetrySql(msg),
        RetryKind::Semantic => Decision::RetrySchema(msg),
    }
}

/// Terminal output for an exhausted retry loop.
pub fn error_output(msg: &WorkflowMessage, error_type: &str) -> Nl2SqlOutput {
    let error = msg.error_message.clone();
    Nl2SqlOutput {
        sql: msg
            .sql
            .clone()
            .unwrap_or_else(|| "-- Error: SQL not generated".into()),
        database: database_or_unknown(msg),
        status: msg.status,
        natural_language_response: Some(format!(
            "❌ {error_type}: {}",
            error.as_deref().unwrap_or("Unknown error")
        )),
        execution_result: ExecutionResult::Error {
            error,
            error_type: error_type.into(),
            status: None,
            syntax_retry_count: msg.retry_context.syntax_retry_count,
            semantic_retry_count: msg.retry_context.semantic_retry_count,
        },
        reasoning_evaluation: None,
    }
}

/// Terminal output for EmptyResult and Timeout.
pub fn execution_issue_output(msg: &WorkflowMessage, return_nl: bool) -> Nl2SqlOutput {
    let (error, error_type) = if msg.status == Status::EmptyResult {
        (EMPTY_RESULT_MESSAGE.to_string(), EMPTY_RESULT_TYPE)
    } else {
        (
            msg.error_message
                .clone()
                .unwrap_or_else(|| "Query execution timed out".into()),
            TIMEOUT_TYPE,
        )
    };

    let natural_language_response = if return_nl && msg.status == Status::EmptyResult {
        format!(
            "The query returned no results. This might be because the data matching your \
             question ('{}') doesn't exist in the database.",
            msg.question
        )
    } else {
        format!("⚠️ {}: {error}", msg.status)
    };

    Nl2SqlOutput {
        sql: msg.sql.clone().unwrap_or_default(),
        database: database_or_unknown(msg),
        status: msg.status,
        natural_language_response: Some(natural_language_response),
        execution_result: ExecutionResult::Error {
            error: Some(error),
            error_type: error_type.into(),
            status: Some(msg.status),
            syntax_retry_count: msg.retry_context.syntax_retry_count,
            semantic_retry_count: msg.retry_context.semantic_retry_count,
        },
        reasoning_evaluation: None,
    }
}

fn database_or_unknown(msg: &WorkflowMessage) -> String {
    if msg.database.is_empty() {
        "unknown".into()
    } else {
        msg.database.clone()
    }
}
