//! Fan-in: combine the success message with the two branch results.

use nq_core::message::WorkflowMessage;
use nq_core::output::{ExecutionResult, Nl2SqlOutput, ReasoningEvaluation};
use serde::Serialize;

/// What one parallel branch produced.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "branch", content = "value", rename_all = "snake_case")]
pub enum BranchResult {
    Evaluation(ReasoningEvaluation),
    NaturalLanguage(Option<String>),
    /// The branch did not finish (panicked or was cancelled).
    Absent,
}

/// Build the success output. Never fails; missing branches get defaults.
pub fn aggregate_success_results(
    message: &WorkflowMessage,
    results: impl IntoIterator<Item = BranchResult>,
) -> Nl2SqlOutput {
    let mut evaluation = None;
    let mut natural_language_response = None;
    for result in results {
        match result {
            BranchResult::Evaluation(e) => evaluation = Some(e),
            BranchResult::NaturalLanguage(text) => natural_language_response = text,
            BranchResult::Absent => {}
        }
    }

    let evaluation = evaluation.unwrap_or_else(|| {
        tracing::warn!("Reasoning evaluation missing, using default");
        ReasoningEvaluation::neutral(
            "Evaluation not performed",
            "• System: Check reasoning evaluation executor",
        )
    });

    if evaluation.is_low_quality() {
        tracing::warn!(
            rows = message.row_count,
            elapsed_ms = message.execution_time_ms,
            evaluation_confidence = evaluation.confidence,
            "Success with low reasoning quality"
        );
    } else {
        tracing::info!(
            rows = message.row_count,
            elapsed_ms = message.execution_time_ms,
            evaluation_confidence = evaluation.confidence,
            "Success"
        );
    }

    Nl2SqlOutput {
        sql: message.sql.clone().unwrap_or_default(),
        database: message.database.clone(),
        status: message.status,
        execution_result: ExecutionResult::Rows {
            rows: message.result_rows.clone().unwrap_or_default(),
            row_count: message.row_count,
            execution_time_ms: message.execution_time_ms,
        },
        natural_language_response,
        reasoning_evaluation: Some(evaluation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nq_core::message::{RetryContext, Status};
    use serde_json::json;

    fn success() -> WorkflowMessage {
        let rows = serde_json::from_value(json!([{"COUNT(*)": 3}])).unwrap();
        WorkflowMessage::init("How many singers?", Some("concert_singer".into()), None, RetryContext::default())
            .executed("SELECT COUNT(*) FROM singer", rows, 95.0, "count", 2.5)
    }

    #[test]
    fn branch_order_does_not_matter() {
        let eval = ReasoningEvaluation {
            is_correct: Some(true),
            confidence: 90.0,
            explanation: "ok".into(),
            suggestions: String::new(),
        };
        let a = aggregate_success_results(
            &success(),
            [
                BranchResult::NaturalLanguage(Some("There are 3 singers.".into())),
                BranchResult::Evaluation(eval.clone()),
            ],
        );
        let b = aggregate_success_results(
            &success(),
            [
                BranchResult::Evaluation(eval.clone()),
                BranchResult::NaturalLanguage(Some("There are 3 singers.".into())),
            ],
        );
        assert_eq!(a, b);
        assert_eq!(a.status, Status::Success);
        assert_eq!(a.execution_result.row_count(), 1);
        assert_eq!(a.reasoning_evaluation, Some(eval));
    }

    #[test]
    fn missing_branches_get_defaults() {
        let output = aggregate_success_results(&success(), [BranchResult::Absent, BranchResult::Absent]);
        let evaluation = output.reasoning_evaluation.unwrap();
        assert_eq!(evaluation.is_correct, None);
        assert_eq!(evaluation.explanation, "Evaluation not performed");
        assert!(output.natural_language_response.is_none());

        let value = serde_json::to_value(aggregate_success_results(&success(), Vec::new())).unwrap();
        assert!(value["natural_language_response"].is_null());
        assert!(value["reasoning_evaluation"].is_object());
    }
}
