//! Success handling: format once, fan out to evaluation and NL response,
//! then fan in.

use crate::aggregate::{aggregate_success_results, BranchResult};
use crate::context::{RunContext, SuccessSnapshot};
use crate::events::EventSink;
use crate::executor_ids::*;
use crate::format::format_results;
use crate::steps::{nl_response, reasoning};
use crate::workflow::Nl2SqlWorkflow;
use crate::RunnerError;
use nq_core::message::WorkflowMessage;
use nq_core::output::Nl2SqlOutput;
use std::sync::Arc;

pub async fn handle_success(
    workflow: &Nl2SqlWorkflow,
    ctx: &Arc<RunContext>,
    msg: WorkflowMessage,
    sink: &EventSink,
) -> Result<Nl2SqlOutput, RunnerError> {
    let rows = msg.result_rows.as_deref().unwrap_or_default();
    let (formatted_results, format) = format_results(rows, workflow.config.nl_table_max_rows);
    tracing::info!(
        rows = msg.row_count,
        format = format.as_str(),
        "Handling successful query"
    );

    ctx.set_success(SuccessSnapshot {
        message: msg.clone(),
        formatted_results,
        format,
    })
    .await;
    sink.step_completed(HANDLE_SUCCESS, &msg).await?;

    let results = fan_out(workflow, ctx, sink).await;
    let output = aggregate_success_results(&msg, results);
    sink.step_completed(AGGREGATE_SUCCESS_RESULTS, &output).await?;
    Ok(output)
}

/// Run both branches concurrently and wait for both.
async fn fan_out(
    workflow: &Nl2SqlWorkflow,
    ctx: &Arc<RunContext>,
    sink: &EventSink,
) -> Vec<BranchResult> {
    let evaluation = tokio::spawn({
        let workflow = workflow.clone();
        let ctx = Arc::clone(ctx);
        let sink = sink.clone();
        async move {
            let evaluation = reasoning::evaluate_sql_reasoning(&workflow, &ctx).await;
            // A dropped receiver surfaces at the aggregate event.
            let _ = sink.step_completed(EVALUATE_SQL_REASONING, &evaluation).await;
            BranchResult::Evaluation(evaluation)
        }
    });

    let natural_language = tokio::spawn({
        let workflow = workflow.clone();
        let ctx = Arc::clone(ctx);
        let sink = sink.clone();
        async move {
            let text = nl_response::generate_natural_language_response(&workflow, &ctx).await;
            let _ = sink.step_completed(GENERATE_NATURAL_LANGUAGE_RESPONSE, &text).await;
            BranchResult::NaturalLanguage(text)
        }
    });

    let mut results = Vec::with_capacity(2);
    for handle in [evaluation, natural_language] {
        match handle.await {
            Ok(result) => results.push(result),
            Err(e) => {
                tracing::error!("Branch join error: {e}");
                results.push(BranchResult::Absent);
            }
        }
    }
    results
}
