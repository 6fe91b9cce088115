//! SQL Generation: generate SQL for the current schema context, gate on
//! confidence, execute, and classify the outcome.

use crate::context::RunContext;
use crate::workflow::Nl2SqlWorkflow;
use crate::RunnerError;
use nq_core::message::{Status, WorkflowMessage};
use nq_core::schema::SchemaContext;
use nq_llm::prompts::{self, SQL_GENERATION_SYSTEM};
use nq_llm::{
    extract_string_field, parse_strict, preview, LlmRequest, Purpose, SqlGeneration,
    StructuredResponse,
};
use nq_policy::ConfidenceGate;
use nq_sql_executor::{classify, FailureKind};
use std::time::Instant;

const SQL_TEMPERATURE: f32 = 0.3;

pub async fn run(
    workflow: &Nl2SqlWorkflow,
    ctx: &RunContext,
    msg: WorkflowMessage,
) -> Result<WorkflowMessage, RunnerError> {
    tracing::info!(status = %msg.status, database = %msg.database, "SQL generation");

    let schema = schema_for(ctx, &msg).await?;
    let prompt = build_prompt(&msg, &schema);

    tracing::info!("Calling LLM for SQL generation");
    let request = LlmRequest::new(Purpose::SqlGeneration, SQL_GENERATION_SYSTEM, prompt)
        .with_temperature(SQL_TEMPERATURE)
        .with_schema(SqlGeneration::json_schema());
    let response = workflow.llm.invoke(request).await?;
    let generated = parse_generation(&response)?;

    tracing::info!(
        sql = %generated.sql,
        confidence = generated.confidence,
        reasoning = %generated.reasoning,
        "SQL generated"
    );
    ctx.set_sql_response(generated.clone()).await;

    let gate = ConfidenceGate::new(workflow.config.confidence_threshold);
    if gate.requires_reanalysis(generated.confidence) {
        tracing::warn!(
            confidence = generated.confidence,
            threshold = gate.threshold,
            "Confidence below threshold, requesting schema re-analysis"
        );
        return Ok(msg.failed(
            Status::SemanticError,
            Some(generated.sql),
            gate.rejection_message(generated.confidence),
            Some(generated.confidence),
            Some(generated.reasoning),
            0.0,
        ));
    }

    tracing::info!(database = %schema.database, "Executing SQL");
    let started = Instant::now();
    let outcome = workflow
        .executor
        .execute(
            &schema.database,
            &generated.sql,
            workflow.config.sql_timeout(),
            workflow.config.max_rows,
        )
        .await;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    match outcome {
        Ok(result) => {
            let rows = result.into_records();
            tracing::info!(rows = rows.len(), elapsed_ms, "Execution finished");
            Ok(msg.executed(
                generated.sql,
                rows,
                generated.confidence,
                generated.reasoning,
                elapsed_ms,
            ))
        }
        Err(e) => {
            let kind = classify(&e);
            let error_message = match kind {
                FailureKind::Timeout => "Query execution timed out".to_string(),
                _ => e.to_string(),
            };
            tracing::error!(?kind, elapsed_ms, "SQL execution failed: {error_message}");
            Ok(msg.failed(
                kind.status(),
                Some(generated.sql),
                error_message,
                Some(generated.confidence),
                Some(generated.reasoning),
                elapsed_ms,
            ))
        }
    }
}

async fn schema_for(ctx: &RunContext, msg: &WorkflowMessage) -> Result<SchemaContext, RunnerError> {
    let schema = match &msg.schema_id {
        Some(id) => ctx.schema(id).await,
        None => ctx.current_schema().await,
    };
    schema.ok_or_else(|| RunnerError::Fatal("no schema context for SQL generation".into()))
}

fn build_prompt(msg: &WorkflowMessage, schema: &SchemaContext) -> String {
    let initial = || {
        prompts::sql_generation(
            &msg.question,
            &schema.detailed_schema,
            schema.selected_tables.as_deref(),
        )
    };

    match (msg.status, msg.sql.as_deref(), msg.error_message.as_deref()) {
        (Status::SyntaxError, Some(sql), Some(error)) => {
            tracing::info!(previous_error = %error, "Using syntax correction prompt");
            prompts::syntax_error_correction(&msg.question, &schema.detailed_schema, sql, error)
        }
        (Status::SemanticError, _, _) => {
            tracing::warn!("Semantic error reached SQL generation, using initial prompt");
            initial()
        }
        _ => initial(),
    }
}

/// Strict parse, then the `sql` field alone at the partial-response confidence.
fn parse_generation(response: &str) -> Result<SqlGeneration, RunnerError> {
    match parse_strict::<SqlGeneration>(response) {
        Ok(parsed) if !parsed.sql.trim().is_empty() => Ok(parsed),
        Ok(_) => Err(RunnerError::Fatal("model returned an empty SQL statement".into())),
        Err(e) => {
            tracing::error!(response = %preview(response, 500), "Failed to parse SQL generation: {e}");
            let sql = extract_string_field(response, "sql").map_err(|_| {
                RunnerError::Fatal(format!("unparseable SQL generation response: {e}"))
            })?;
            tracing::warn!("Recovered SQL from partial response");
            Ok(SqlGeneration::partial(sql))
        }
    }
}
