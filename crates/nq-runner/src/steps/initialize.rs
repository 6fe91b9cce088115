//! First step: load the catalog into the run state and build the Init message.

use crate::context::RunContext;
use crate::workflow::{Nl2SqlWorkflow, WorkflowInput};
use crate::RunnerError;
use nq_core::message::WorkflowMessage;
use uuid::Uuid;

pub async fn initialize_context(
    workflow: &Nl2SqlWorkflow,
    run_id: Uuid,
    input: &WorkflowInput,
) -> Result<(RunContext, WorkflowMessage), RunnerError> {
    tracing::info!(
        run_id = %run_id,
        question = %input.question,
        database = ?input.database,
        tables = ?input.tables,
        "NL2SQL workflow started"
    );

    if input.question.trim().is_empty() {
        return Err(RunnerError::Fatal("question is empty".into()));
    }

    let catalog = workflow.catalog.load_catalog().await?;
    let ctx = RunContext::new(run_id, catalog, input.return_natural_language);

    let message = WorkflowMessage::init(
        input.question.clone(),
        input.database.clone().filter(|db| !db.trim().is_empty()),
        input.tables.clone(),
        workflow.config.retry_context(),
    );
    Ok((ctx, message))
}
