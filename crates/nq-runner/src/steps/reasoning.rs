//! Reasoning Evaluation: second opinion on the SQL and its stated reasoning.
//! Never fails: any problem degrades to a neutral evaluation.

use crate::context::RunContext;
use crate::workflow::Nl2SqlWorkflow;
use nq_core::output::ReasoningEvaluation;
use nq_llm::prompts::{self, EvaluationPrompt, REASONING_EVALUATION_SYSTEM};
use nq_llm::{parse_strict, LlmRequest, Purpose, StructuredResponse};

const EVAL_TEMPERATURE: f32 = 0.3;
const FAILURE_SUGGESTIONS: &str =
    "• System: Enable detailed error logging\n• Monitoring: Track evaluation success rate";

pub async fn evaluate_sql_reasoning(
    workflow: &Nl2SqlWorkflow,
    ctx: &RunContext,
) -> ReasoningEvaluation {
    tracing::info!("Evaluating SQL reasoning");
    match evaluate(workflow, ctx).await {
        Ok(evaluation) => {
            tracing::info!(
                is_correct = ?evaluation.is_correct,
                confidence = evaluation.confidence,
                "Reasoning evaluated"
            );
            evaluation
        }
        Err(reason) => {
            tracing::warn!("Failed to evaluate reasoning: {reason}");
            ReasoningEvaluation::neutral(format!("Evaluation failed: {reason}"), FAILURE_SUGGESTIONS)
        }
    }
}

async fn evaluate(workflow: &Nl2SqlWorkflow, ctx: &RunContext) -> Result<ReasoningEvaluation, String> {
    let snapshot = ctx
        .success()
        .await
        .ok_or_else(|| "no successful execution in run state".to_string())?;
    let generated = ctx
        .sql_response()
        .await
        .ok_or_else(|| "no SQL generation response in run state".to_string())?;

    let limit = workflow.config.eval_result_preview_chars;
    let msg = &snapshot.message;
    let schema_subset = match ctx.catalog().database(&msg.database) {
        Some(meta) => match serde_json::to_string_pretty(meta) {
            Ok(json) => truncate(&json, limit),
            Err(e) => {
                tracing::warn!("Could not serialize catalog entry: {e}");
                "(Schema not available)".into()
            }
        },
        None => "(Schema not available)".into(),
    };
    let formatted_results = truncate(&snapshot.formatted_results, limit);

    let prompt = prompts::reasoning_evaluation(&EvaluationPrompt {
        question: &msg.question,
        sql: &generated.sql,
        reasoning: &generated.reasoning,
        confidence: generated.confidence,
        formatted_results: &formatted_results,
        row_count: msg.row_count,
        execution_time_ms: msg.execution_time_ms,
        schema_subset: &schema_subset,
    });

    let request = LlmRequest::new(Purpose::ReasoningEvaluation, REASONING_EVALUATION_SYSTEM, prompt)
        .with_temperature(EVAL_TEMPERATURE)
        .with_schema(ReasoningEvaluation::json_schema());
    let response = workflow.llm.invoke(request).await.map_err(|e| e.to_string())?;
    parse_strict::<ReasoningEvaluation>(&response).map_err(|e| e.to_string())
}

/// First `limit` characters, marked when cut.
fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}\n... (truncated)", &text[..cut]),
        None => text.to_string(),
    }
}
