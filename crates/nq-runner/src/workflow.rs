//! Workflow Orchestrator: drives one run through the state machine.
//!
//! ```text
//! initialize_context -> schema_understanding -> sql_generation -> sql_reviewer
//!                              ^                     ^              |
//!                              |   SemanticError     |  SyntaxError |
//!                              +---------------------+--------------+
//!                                                                   | Success
//!                                       handle_success -> (evaluate || nl) -> aggregate
//! ```

use crate::context::RunContext;
use crate::events::EventSink;
use crate::executor_ids::*;
use crate::reviewer::{self, Decision};
use crate::steps::{initialize, schema_understanding, sql_generation};
use crate::success;
use crate::RunnerError;
use nq_catalog::CatalogStore;
use nq_core::event::WorkflowEvent;
use nq_core::output::Nl2SqlOutput;
use nq_llm::LlmClient;
use nq_policy::WorkflowConfig;
use nq_sql_executor::SqliteExecutor;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

const EVENT_BUFFER: usize = 64;

/// Caller input for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowInput {
    pub question: String,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub tables: Option<Vec<String>>,
    #[serde(default)]
    pub return_natural_language: bool,
}

impl WorkflowInput {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_tables(mut self, tables: Vec<String>) -> Self {
        self.tables = Some(tables);
        self
    }

    pub fn with_natural_language(mut self, enabled: bool) -> Self {
        self.return_natural_language = enabled;
        self
    }
}

/// Services shared by every run. Cheap to clone.
#[derive(Clone)]
pub struct Nl2SqlWorkflow {
    pub(crate) llm: Arc<dyn LlmClient>,
    pub(crate) catalog: Arc<CatalogStore>,
    pub(crate) executor: Arc<SqliteExecutor>,
    pub(crate) config: WorkflowConfig,
}

impl Nl2SqlWorkflow {
    /// SQL runs against the catalog store's database directory.
    pub fn new(
        llm: Arc<dyn LlmClient>,
        catalog: Arc<CatalogStore>,
        config: WorkflowConfig,
    ) -> Result<Self, RunnerError> {
        config.validate()?;
        let executor = Arc::new(SqliteExecutor::new(catalog.database_dir().clone()));
        Ok(Self {
            llm,
            catalog,
            executor,
            config,
        })
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    /// Run to completion and return the terminal output.
    pub async fn run(&self, input: WorkflowInput) -> Result<Nl2SqlOutput, RunnerError> {
        let run_id = Uuid::new_v4();
        self.drive(run_id, input, &EventSink::disabled(run_id)).await
    }

    /// Run in the background, streaming one event per completed step and
    /// ending with exactly one `Completed` or `Failed`.
    pub fn run_stream(&self, input: WorkflowInput) -> mpsc::Receiver<WorkflowEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let run_id = Uuid::new_v4();
        let workflow = self.clone();

        tokio::spawn(async move {
            let sink = EventSink::new(run_id, tx);
            let terminal = match workflow.drive(run_id, input, &sink).await {
                Ok(output) => WorkflowEvent::Completed { run_id, output },
                Err(e) => WorkflowEvent::Failed {
                    run_id,
                    error: e.to_string(),
                },
            };
            sink.finish(terminal).await;
        });

        rx
    }

    async fn drive(
        &self,
        run_id: Uuid,
        input: WorkflowInput,
        sink: &EventSink,
    ) -> Result<Nl2SqlOutput, RunnerError> {
        let (ctx, mut msg) = initialize::initialize_context(self, run_id, &input).await?;
        let ctx: Arc<RunContext> = Arc::new(ctx);
        sink.step_completed(INITIALIZE_CONTEXT, &msg).await?;

        let mut select_schema = true;
        loop {
            if select_schema {
                msg = schema_understanding::run(self, &ctx, msg).await?;
                sink.step_completed(SCHEMA_UNDERSTANDING, &msg).await?;
            }

            msg = sql_generation::run(self, &ctx, msg).await?;
            sink.step_completed(SQL_GENERATION, &msg).await?;

            let decision = reviewer::review(msg, ctx.return_natural_language())?;
            tracing::info!(run_id = %run_id, decision = decision.label(), "Reviewer decision");
            sink.step_completed(SQL_REVIEWER, &decision).await?;

            match decision {
                Decision::Approve(approved) => {
                    return success::handle_success(self, &ctx, approved, sink).await;
                }
                Decision::RetrySql(next) => {
                    msg = next;
                    select_schema = false;
                }
                Decision::RetrySchema(next) => {
                    msg = next;
                    select_schema = true;
                }
                Decision::Terminate(output) => {
                    tracing::info!(run_id = %run_id, status = %output.status, "Workflow finished without results");
                    return Ok(output);
                }
            }
        }
    }
}
