//! nq-sql-executor: Read-only SQL execution against SQLite with timeout and failure classification.

pub mod guard;
pub mod sqlite;
pub mod timeout;

pub use sqlite::SqliteExecutor;

use nq_core::message::{ResultRow, Status};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Error reported by the database engine, message verbatim.
    #[error("{0}")]
    Database(String),
    #[error("query timed out after {0}ms")]
    Timeout(u64),
    #[error("Only read-only SELECT queries are allowed: {0}")]
    Rejected(String),
    #[error("database not found: {0}")]
    DatabaseNotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Columns and rows of a successful query, in query column order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl QueryResult {
    /// Zip every row with the column names.
    pub fn into_records(self) -> Vec<ResultRow> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|row| columns.iter().cloned().zip(row).collect())
            .collect()
    }
}

/// How a failed execution is routed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FailureKind {
    /// Regenerate SQL against the same schema.
    Syntax,
    /// Re-run schema selection.
    Semantic,
    /// Terminal.
    Timeout,
}

impl FailureKind {
    pub fn status(self) -> Status {
        match self {
            FailureKind::Syntax => Status::SyntaxError,
            FailureKind::Semantic => Status::SemanticError,
            FailureKind::Timeout => Status::Timeout,
        }
    }
}

const SEMANTIC_INDICATORS: &[&str] = &["no such table", "no such column", "ambiguous column"];

/// Map an execution failure onto the retry loops.
///
/// Anything that is neither a timeout nor a recognised schema mismatch is
/// treated as a syntax error, including failures that did not come from the
/// engine at all. That last case is a heuristic and may spend a syntax retry
/// on a problem regeneration cannot fix.
pub fn classify(error: &ExecutorError) -> FailureKind {
    match error {
        ExecutorError::Timeout(_) => FailureKind::Timeout,
        ExecutorError::Database(msg) => {
            let lower = msg.to_lowercase();
            if SEMANTIC_INDICATORS.iter().any(|i| lower.contains(i)) {
                FailureKind::Semantic
            } else {
                FailureKind::Syntax
            }
        }
        ExecutorError::Rejected(_) => FailureKind::Syntax,
        ExecutorError::DatabaseNotFound(_) | ExecutorError::Internal(_) => {
            tracing::warn!(error = %error, "Unexpected execution failure, treating as syntax error");
            FailureKind::Syntax
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_mismatches_are_semantic() {
        for msg in [
            "no such table: singers",
            "no such column: T1.nam",
            "ambiguous column name: Name",
            "No Such Table: X",
        ] {
            assert_eq!(
                classify(&ExecutorError::Database(msg.into())),
                FailureKind::Semantic,
                "{msg}"
            );
        }
    }

    #[test]
    fn other_engine_errors_are_syntax() {
        let e = ExecutorError::Database("near \"SELEC\": syntax error".into());
        assert_eq!(classify(&e), FailureKind::Syntax);
        assert_eq!(classify(&ExecutorError::Rejected("DROP".into())), FailureKind::Syntax);
    }

    #[test]
    fn unexpected_failures_fall_back_to_syntax() {
        assert_eq!(
            classify(&ExecutorError::DatabaseNotFound("x".into())),
            FailureKind::Syntax
        );
        assert_eq!(classify(&ExecutorError::Internal("boom".into())), FailureKind::Syntax);
    }

    #[test]
    fn timeout_is_terminal() {
        let kind = classify(&ExecutorError::Timeout(30_000));
        assert_eq!(kind, FailureKind::Timeout);
        assert_eq!(kind.status(), Status::Timeout);
    }

    #[test]
    fn records_keep_column_order() {
        let result = QueryResult {
            columns: vec!["name".into(), "age".into()],
            rows: vec![vec![json!("Joe"), json!(52)]],
        };
        let records = result.into_records();
        let keys: Vec<_> = records[0].keys().cloned().collect();
        assert_eq!(keys, vec!["name", "age"]);
        assert_eq!(records[0]["age"], json!(52));
    }

    #[test]
    fn rejected_message_names_the_rule() {
        let e = ExecutorError::Rejected("statement must start with SELECT or WITH".into());
        assert!(e.to_string().starts_with("Only read-only SELECT queries are allowed: "));
    }
}
