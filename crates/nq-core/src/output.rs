//! Terminal output of a workflow run.

use crate::message::{ResultRow, Status};
use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Reasoning evaluation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReasoningEvaluation {
    /// `None` when the evaluation could not be performed.
    pub is_correct: Option<bool>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub explanation: String,
    #[serde(default, deserialize_with = "string_or_list")]
    pub suggestions: String,
}

impl ReasoningEvaluation {
    /// Neutral evaluation used when the evaluator fails or is missing.
    pub fn neutral(explanation: impl Into<String>, suggestions: impl Into<String>) -> Self {
        Self {
            is_correct: None,
            confidence: 0.0,
            explanation: explanation.into(),
            suggestions: suggestions.into(),
        }
    }

    pub fn is_low_quality(&self) -> bool {
        self.is_correct != Some(true) && self.confidence < 50.0
    }
}

/// Models sometimes return suggestions as a list; fold it into bullet lines.
fn string_or_list<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        List(Vec<String>),
        Null(()),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::List(items) => items
            .iter()
            .map(|s| format!("• {s}"))
            .collect::<Vec<_>>()
            .join("\n"),
        Raw::Null(()) => String::new(),
    })
}

// ---------------------------------------------------------------------------
// Execution result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ExecutionResult {
    Rows {
        rows: Vec<ResultRow>,
        row_count: usize,
        execution_time_ms: f64,
    },
    Error {
        error: Option<String>,
        error_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<Status>,
        syntax_retry_count: u32,
        semantic_retry_count: u32,
    },
}

impl ExecutionResult {
    pub fn error_type(&self) -> Option<&str> {
        match self {
            ExecutionResult::Error { error_type, .. } => Some(error_type),
            ExecutionResult::Rows { .. } => None,
        }
    }

    pub fn row_count(&self) -> usize {
        match self {
            ExecutionResult::Rows { row_count, .. } => *row_count,
            ExecutionResult::Error { .. } => 0,
        }
    }

    pub fn retry_counts(&self) -> Option<(u32, u32)> {
        match self {
            ExecutionResult::Error {
                syntax_retry_count,
                semantic_retry_count,
                ..
            } => Some((*syntax_retry_count, *semantic_retry_count)),
            ExecutionResult::Rows { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// NL2SQL output
// ---------------------------------------------------------------------------

/// Produced exactly once per run, by the aggregator or by an error handler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Nl2SqlOutput {
    pub sql: String,
    pub database: String,
    pub status: Status,
    pub execution_result: ExecutionResult,
    /// Always serialized; `null` when not requested or not applicable.
    pub natural_language_response: Option<String>,
    pub reasoning_evaluation: Option<ReasoningEvaluation>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
