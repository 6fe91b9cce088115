//! Structured responses requested from the model, with their JSON schemas.

use nq_core::output::ReasoningEvaluation;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A response type the model is asked to produce as JSON.
pub trait StructuredResponse: DeserializeOwned {
    fn json_schema() -> Value;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchemaSelection {
    #[serde(alias = "_database")]
    pub database: String,
    #[serde(default)]
    pub tables: Option<Vec<String>>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl StructuredResponse for SchemaSelection {
    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "database": {"type": "string", "description": "Selected database name"},
                "tables": {"type": "array", "items": {"type": "string"}},
                "reasoning": {"type": "string"}
            },
            "required": ["database", "tables", "reasoning"]
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SqlGeneration {
    pub sql: String,
    #[serde(default)]
    pub reasoning: String,
    /// Self-reported, 0-100.
    pub confidence: f64,
}

impl SqlGeneration {
    /// Confidence assigned when only the SQL could be recovered.
    pub const PARTIAL_CONFIDENCE: f64 = 50.0;

    pub fn partial(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            reasoning: "SQL generation completed with partial response (JSON parsing failed)"
                .into(),
            confidence: Self::PARTIAL_CONFIDENCE,
        }
    }
}

impl StructuredResponse for SqlGeneration {
    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "sql": {"type": "string", "description": "A single SQLite SELECT statement"},
                "reasoning": {"type": "string"},
                "confidence": {"type": "number", "minimum": 0, "maximum": 100}
            },
            "required": ["sql", "reasoning", "confidence"]
        })
    }
}

impl StructuredResponse for ReasoningEvaluation {
    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "is_correct": {"type": "boolean"},
                "confidence": {"type": "number", "minimum": 0, "maximum": 100},
                "explanation": {"type": "string"},
                "suggestions": {"type": "string"}
            },
            "required": ["is_correct", "confidence", "explanation", "suggestions"]
        })
    }
}
