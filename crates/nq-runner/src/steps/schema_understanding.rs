//! Schema Understanding: pick the database and tables for the question.

use crate::context::RunContext;
use crate::workflow::Nl2SqlWorkflow;
use crate::RunnerError;
use nq_core::message::{Status, WorkflowMessage};
use nq_core::schema::SchemaContext;
use nq_llm::prompts::{self, SCHEMA_UNDERSTANDING_SYSTEM};
use nq_llm::{
    extract_string_field, parse_strict, preview, LlmRequest, Purpose, SchemaSelection,
    StructuredResponse,
};
use uuid::Uuid;

const BYPASS_REASONING: &str = "Database and tables pre-selected by user";
const PARTIAL_REASONING: &str =
    "Schema selection completed with partial response (JSON parsing failed)";

pub async fn run(
    workflow: &Nl2SqlWorkflow,
    ctx: &RunContext,
    msg: WorkflowMessage,
) -> Result<WorkflowMessage, RunnerError> {
    tracing::info!(status = %msg.status, question = %msg.question, "Schema understanding");

    let (selection, confidence) = match pre_selected(&msg) {
        Some(selection) => {
            tracing::info!(database = %selection.database, "Using pre-selected schema, skipping LLM");
            (selection, Some(100.0))
        }
        None => (select_with_llm(workflow, ctx, &msg).await?, None),
    };

    let database = selection.database.trim().to_string();
    if database.is_empty() {
        return Err(RunnerError::Fatal("model did not select a database".into()));
    }
    let tables = selection.tables.filter(|t| !t.is_empty());
    let reasoning = selection.reasoning.unwrap_or_default();
    tracing::info!(database = %database, tables = ?tables, reasoning = %reasoning, "Schema selected");

    let detailed_schema = workflow.catalog.get_detailed_schema(&database).await?;

    let schema_id = Uuid::new_v4().to_string();
    ctx.put_schema(SchemaContext {
        context_id: schema_id.clone(),
        database: database.clone(),
        detailed_schema,
        selected_tables: tables.clone(),
        rationale: reasoning.clone(),
    })
    .await;

    Ok(msg.schema_selected(database, tables, schema_id, confidence, Some(reasoning)))
}

/// First pass with both database and tables supplied by the caller.
fn pre_selected(msg: &WorkflowMessage) -> Option<SchemaSelection> {
    if msg.status != Status::Init || msg.database.is_empty() {
        return None;
    }
    let tables = msg.selected_tables.clone().filter(|t| !t.is_empty())?;
    Some(SchemaSelection {
        database: msg.database.clone(),
        tables: Some(tables),
        reasoning: Some(BYPASS_REASONING.into()),
    })
}

async fn select_with_llm(
    workflow: &Nl2SqlWorkflow,
    ctx: &RunContext,
    msg: &WorkflowMessage,
) -> Result<SchemaSelection, RunnerError> {
    let catalog = ctx.catalog();
    let scope = if msg.database.is_empty() {
        None
    } else if catalog.contains(&msg.database) {
        Some(msg.database.as_str())
    } else {
        tracing::warn!(database = %msg.database, "Selected database not found in catalog, using full catalog");
        None
    };

    let listing = catalog.table_listing(scope);
    let catalog_json = serde_json::to_string_pretty(&listing)
        .map_err(|e| RunnerError::Fatal(format!("catalog listing: {e}")))?;

    let prompt = if msg.status == Status::SemanticError {
        prompts::semantic_error_correction(
            &msg.question,
            &msg.database,
            &catalog_json,
            msg.sql.as_deref(),
            msg.error_message.as_deref().unwrap_or_default(),
        )
    } else {
        prompts::schema_understanding(
            &msg.question,
            &catalog_json,
            scope,
            msg.selected_tables.as_deref(),
        )
    };

    tracing::info!(databases = listing.len(), "Calling LLM for schema selection");
    let request = LlmRequest::new(Purpose::SchemaSelection, SCHEMA_UNDERSTANDING_SYSTEM, prompt)
        .with_schema(SchemaSelection::json_schema());
    let response = workflow.llm.invoke(request).await?;

    match parse_strict::<SchemaSelection>(&response) {
        Ok(selection) => Ok(selection),
        Err(e) => {
            tracing::error!(response = %preview(&response, 500), "Failed to parse schema selection: {e}");
            let database = extract_string_field(&response, "database").map_err(|_| {
                RunnerError::Fatal(format!("unparseable schema selection response: {e}"))
            })?;
            tracing::warn!(database = %database, "Recovered database from partial response");
            Ok(SchemaSelection {
                database,
                tables: None,
                reasoning: Some(PARTIAL_REASONING.into()),
            })
        }
    }
}
