//! End-to-end runs against a scratch concert_singer database and a scripted model.

use nq_catalog::{generate_catalog, write_catalog, CatalogError, CatalogStore, DatabaseDir};
use nq_core::event::WorkflowEvent;
use nq_core::message::Status;
use nq_core::output::{ExecutionResult, Nl2SqlOutput};
use nq_llm::{MockLlm, Purpose};
use nq_policy::WorkflowConfig;
use nq_runner::{Nl2SqlWorkflow, RunnerError, WorkflowInput};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::Arc;

const DDL: &str = "
    CREATE TABLE stadium (
        Stadium_ID INTEGER PRIMARY KEY,
        Name TEXT NOT NULL,
        Capacity INTEGER
    );
    CREATE TABLE singer (
        Singer_ID INTEGER PRIMARY KEY,
        Name TEXT,
        Country TEXT,
        Age INTEGER
    );
    CREATE TABLE concert (
        concert_ID INTEGER PRIMARY KEY,
        Stadium_ID INTEGER,
        FOREIGN KEY (Stadium_ID) REFERENCES stadium(Stadium_ID)
    );
    INSERT INTO stadium VALUES (1, 'Stark''s Park', 10104), (2, 'Somerset Park', 11998);
    INSERT INTO singer VALUES
        (1, 'Joe Sharp', 'Netherlands', 52),
        (2, 'Timbaland', 'United States', 32),
        (3, 'Justin Brown', 'France', 29);
    INSERT INTO concert VALUES (1, 1), (2, 2);
";

const SCHEMA_REPLY: &str =
    r#"{"database": "concert_singer", "tables": ["singer"], "reasoning": "Singers live in singer."}"#;
const COUNT_REPLY: &str =
    r#"{"sql": "SELECT COUNT(*) FROM singer", "reasoning": "Count every singer row.", "confidence": 95}"#;
const EVAL_REPLY: &str =
    r#"{"is_correct": true, "confidence": 90, "explanation": "Counts all singers.", "suggestions": ""}"#;

struct Fixture {
    root: PathBuf,
    llm: Arc<MockLlm>,
}

impl Fixture {
    fn new() -> Self {
        let root = std::env::temp_dir().join(format!("nq-runner-{}", uuid::Uuid::new_v4()));
        let db_dir = root.join("database").join("concert_singer");
        std::fs::create_dir_all(&db_dir).unwrap();
        let conn = Connection::open(db_dir.join("concert_singer.sqlite")).unwrap();
        conn.execute_batch(DDL).unwrap();
        drop(conn);

        let catalog = generate_catalog(&DatabaseDir::new(root.join("database")), 3).unwrap();
        write_catalog(&catalog, &root.join("m_schema.json")).unwrap();

        Self {
            root,
            llm: Arc::new(MockLlm::new()),
        }
    }

    fn workflow(&self) -> Nl2SqlWorkflow {
        self.workflow_with(WorkflowConfig::default())
    }

    fn workflow_with(&self, config: WorkflowConfig) -> Nl2SqlWorkflow {
        let store = CatalogStore::new(self.root.join("m_schema.json"), self.root.join("database"));
        Nl2SqlWorkflow::new(self.llm.clone(), Arc::new(store), config).unwrap()
    }

    /// Schema, evaluation and NL replies for a run that should succeed.
    fn script_happy_path(&self) {
        self.llm
            .always(Purpose::SchemaSelection, SCHEMA_REPLY)
            .always(Purpose::ReasoningEvaluation, EVAL_REPLY)
            .always(Purpose::NaturalLanguage, "There are **3** singers.");
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

fn sql_reply(sql: &str, confidence: f64) -> String {
    serde_json::json!({"sql": sql, "reasoning": "test", "confidence": confidence}).to_string()
}

async fn collect(mut rx: tokio::sync::mpsc::Receiver<WorkflowEvent>) -> Vec<WorkflowEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

fn completed(events: &[WorkflowEvent]) -> &Nl2SqlOutput {
    match events.last() {
        Some(WorkflowEvent::Completed { output, .. }) => output,
        other => panic!("expected Completed, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Success path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn counts_singers() {
    let fx = Fixture::new();
    fx.script_happy_path();
    fx.llm.push_response(Purpose::SqlGeneration, COUNT_REPLY);

    let output = fx
        .workflow()
        .run(
            WorkflowInput::new("How many singers do we have?")
                .with_database("concert_singer")
                .with_natural_language(true),
        )
        .await
        .unwrap();

    assert_eq!(output.status, Status::Success);
    assert!(output.sql.starts_with("SELECT COUNT"));
    assert_eq!(output.database, "concert_singer");
    assert_eq!(output.execution_result.row_count(), 1);
    let ExecutionResult::Rows { rows, .. } = &output.execution_result else {
        panic!("expected rows");
    };
    assert_eq!(rows[0]["COUNT(*)"], 3);
    assert_eq!(output.natural_language_response.as_deref(), Some("There are **3** singers."));
    assert_eq!(output.reasoning_evaluation.unwrap().is_correct, Some(true));

    assert_eq!(fx.llm.call_count(Purpose::SchemaSelection), 1);
    let schema_prompt = &fx.llm.calls(Purpose::SchemaSelection)[0].user;
    assert!(schema_prompt.contains("concert_singer"));
}

#[tokio::test]
async fn pre_selected_schema_skips_the_model() {
    let fx = Fixture::new();
    fx.script_happy_path();
    fx.llm.push_response(Purpose::SqlGeneration, COUNT_REPLY);

    let output = fx
        .workflow()
        .run(
            WorkflowInput::new("How many singers do we have?")
                .with_database("concert_singer")
                .with_tables(vec!["singer".into()]),
        )
        .await
        .unwrap();

    assert_eq!(output.status, Status::Success);
    assert_eq!(fx.llm.call_count(Purpose::SchemaSelection), 0);
    let sql_prompt = &fx.llm.calls(Purpose::SqlGeneration)[0].user;
    assert!(sql_prompt.contains("Use ONLY these tables: singer"));
    assert!(sql_prompt.contains("CREATE TABLE singer"));
}

#[tokio::test]
async fn natural_language_is_null_when_not_requested() {
    let fx = Fixture::new();
    fx.script_happy_path();
    fx.llm.push_response(Purpose::SqlGeneration, COUNT_REPLY);

    let output = fx
        .workflow()
        .run(WorkflowInput::new("How many singers do we have?"))
        .await
        .unwrap();

    assert!(output.natural_language_response.is_none());
    assert!(output.reasoning_evaluation.is_some());
    assert_eq!(fx.llm.call_count(Purpose::NaturalLanguage), 0);
}

#[tokio::test]
async fn post_processing_failures_degrade() {
    let fx = Fixture::new();
    fx.llm.always(Purpose::SchemaSelection, SCHEMA_REPLY);
    fx.llm
        .push_response(Purpose::SqlGeneration, COUNT_REPLY)
        .push_error(Purpose::ReasoningEvaluation, "model overloaded")
        .push_error(Purpose::NaturalLanguage, "model overloaded");

    let output = fx
        .workflow()
        .run(WorkflowInput::new("How many singers do we have?").with_natural_language(true))
        .await
        .unwrap();

    assert_eq!(output.status, Status::Success);
    let evaluation = output.reasoning_evaluation.unwrap();
    assert_eq!(evaluation.is_correct, None);
    assert_eq!(evaluation.confidence, 0.0);
    assert!(evaluation.explanation.starts_with("Evaluation failed:"));
    assert_eq!(output.natural_language_response.as_deref(), Some("Found 1 result(s)."));
}

#[tokio::test]
async fn evaluator_sees_truncated_results_and_schema() {
    let fx = Fixture::new();
    fx.script_happy_path();
    fx.llm.push_response(
        Purpose::SqlGeneration,
        sql_reply("SELECT Name, Country FROM singer ORDER BY Name", 90.0),
    );

    let config = WorkflowConfig {
        eval_result_preview_chars: 20,
        ..Default::default()
    };
    fx.workflow_with(config)
        .run(WorkflowInput::new("List singers and their countries"))
        .await
        .unwrap();

    let prompt = &fx.llm.calls(Purpose::ReasoningEvaluation)[0].user;
    assert!(prompt.contains("... (truncated)"));
    assert!(prompt.contains("SELECT Name, Country FROM singer ORDER BY Name"));
}

// ---------------------------------------------------------------------------
// Retry loops
// ---------------------------------------------------------------------------

#[tokio::test]
async fn low_confidence_routes_to_schema_reanalysis() {
    let fx = Fixture::new();
    fx.script_happy_path();
    fx.llm
        .push_response(Purpose::SqlGeneration, sql_reply("SELECT COUNT(*) FROM concert", 30.0))
        .push_response(Purpose::SqlGeneration, COUNT_REPLY);

    let events = collect(
        fx.workflow()
            .run_stream(WorkflowInput::new("How many singers do we have?")),
    )
    .await;

    let first_generation = events
        .iter()
        .find_map(|e| match e {
            WorkflowEvent::StepCompleted { executor_id, payload, .. }
                if executor_id == "sql_generation" =>
            {
                Some(payload)
            }
            _ => None,
        })
        .unwrap();
    assert_eq!(first_generation["status"], "SemanticError");
    assert!(first_generation["error_message"]
        .as_str()
        .unwrap()
        .contains("Low confidence"));

    let output = completed(&events);
    assert_eq!(output.status, Status::Success);
    assert_eq!(fx.llm.call_count(Purpose::SchemaSelection), 2);
    let retry_prompt = &fx.llm.calls(Purpose::SchemaSelection)[1].user;
    assert!(retry_prompt.contains("Low confidence (30%)"));
}

#[tokio::test]
async fn syntax_errors_stop_after_budget() {
    let fx = Fixture::new();
    fx.script_happy_path();
    fx.llm.always(
        Purpose::SqlGeneration,
        sql_reply("SELECT COUNT(*) FROM singer WHERE", 90.0),
    );

    let output = fx
        .workflow()
        .run(WorkflowInput::new("How many singers do we have?"))
        .await
        .unwrap();

    assert_eq!(output.status, Status::SyntaxError);
    assert_eq!(output.execution_result.error_type(), Some("SQL Syntax Error"));
    assert_eq!(output.execution_result.retry_counts(), Some((2, 0)));
    assert_eq!(output.sql, "SELECT COUNT(*) FROM singer WHERE");
    assert!(output
        .natural_language_response
        .unwrap()
        .starts_with("❌ SQL Syntax Error: "));

    assert_eq!(fx.llm.call_count(Purpose::SqlGeneration), 3);
    assert_eq!(fx.llm.call_count(Purpose::SchemaSelection), 1);
    let retry_prompt = &fx.llm.calls(Purpose::SqlGeneration)[1].user;
    assert!(retry_prompt.contains("This SQL failed:\nSELECT COUNT(*) FROM singer WHERE"));
}

#[tokio::test]
async fn dropped_stream_stops_the_run() {
    let fx = Fixture::new();
    fx.script_happy_path();
    fx.llm.always(
        Purpose::SqlGeneration,
        sql_reply("SELECT COUNT(*) FROM singer WHERE", 90.0),
    );

    let rx = fx
        .workflow()
        .run_stream(WorkflowInput::new("How many singers do we have?"));
    drop(rx);
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    assert_eq!(fx.llm.total_calls(), 0);
}

#[tokio::test]
async fn semantic_errors_stop_after_budget() {
    let fx = Fixture::new();
    fx.script_happy_path();
    fx.llm.always(
        Purpose::SqlGeneration,
        sql_reply("SELECT COUNT(*) FROM singers", 90.0),
    );

    let output = fx
        .workflow()
        .run(WorkflowInput::new("How many singers do we have?"))
        .await
        .unwrap();

    assert_eq!(output.status, Status::SemanticError);
    assert_eq!(output.execution_result.error_type(), Some("Database Schema Error"));
    assert_eq!(output.execution_result.retry_counts(), Some((0, 2)));
    assert_eq!(fx.llm.call_count(Purpose::SchemaSelection), 3);
    assert_eq!(fx.llm.call_count(Purpose::SqlGeneration), 3);
}

#[tokio::test]
async fn spent_syntax_budget_leaves_semantic_budget() {
    let fx = Fixture::new();
    fx.script_happy_path();
    fx.llm
        .push_response(Purpose::SqlGeneration, sql_reply("SELECT COUNT(*) FROM singer WHERE", 90.0))
        .push_response(Purpose::SqlGeneration, sql_reply("SELECT COUNT(*) FROM singer WHERE", 90.0))
        .push_response(Purpose::SqlGeneration, sql_reply("SELECT COUNT(*) FROM singers", 90.0))
        .push_response(Purpose::SqlGeneration, COUNT_REPLY);

    let output = fx
        .workflow()
        .run(WorkflowInput::new("How many singers do we have?"))
        .await
        .unwrap();

    assert_eq!(output.status, Status::Success);
    assert_eq!(fx.llm.call_count(Purpose::SqlGeneration), 4);
    assert_eq!(fx.llm.call_count(Purpose::SchemaSelection), 2);
}

#[tokio::test]
async fn zero_budgets_fail_on_first_error() {
    let fx = Fixture::new();
    fx.script_happy_path();
    fx.llm.always(
        Purpose::SqlGeneration,
        sql_reply("SELECT COUNT(*) FROM singer WHERE", 90.0),
    );

    let config = WorkflowConfig {
        max_syntax_retries: 0,
        max_semantic_retries: 0,
        ..Default::default()
    };
    let output = fx
        .workflow_with(config)
        .run(WorkflowInput::new("How many singers do we have?"))
        .await
        .unwrap();

    assert_eq!(output.execution_result.retry_counts(), Some((0, 0)));
    assert_eq!(fx.llm.call_count(Purpose::SqlGeneration), 1);
}

// ---------------------------------------------------------------------------
// Terminal non-retryable outcomes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_result_is_explained_not_retried() {
    let fx = Fixture::new();
    fx.script_happy_path();
    fx.llm.always(
        Purpose::SqlGeneration,
        sql_reply("SELECT Name FROM singer WHERE Country = 'Atlantis'", 90.0),
    );

    let output = fx
        .workflow()
        .run(WorkflowInput::new("Which singers are from Atlantis?").with_natural_language(true))
        .await
        .unwrap();

    assert_eq!(output.status, Status::EmptyResult);
    assert_eq!(output.execution_result.error_type(), Some("Empty Result"));
    let text = output.natural_language_response.unwrap();
    assert!(text.starts_with("The query returned no results."));
    assert!(text.contains("('Which singers are from Atlantis?')"));
    assert!(output.reasoning_evaluation.is_none());

    assert_eq!(fx.llm.call_count(Purpose::SqlGeneration), 1);
    assert_eq!(fx.llm.call_count(Purpose::NaturalLanguage), 0);
}

#[tokio::test]
async fn slow_query_times_out() {
    let fx = Fixture::new();
    fx.script_happy_path();
    fx.llm.always(
        Purpose::SqlGeneration,
        sql_reply(
            "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n) SELECT COUNT(*) FROM n",
            90.0,
        ),
    );

    let config = WorkflowConfig {
        sql_timeout_secs: 0.2,
        ..Default::default()
    };
    let output = fx
        .workflow_with(config)
        .run(WorkflowInput::new("Count forever"))
        .await
        .unwrap();

    assert_eq!(output.status, Status::Timeout);
    assert_eq!(output.execution_result.error_type(), Some("Query Timeout"));
    assert_eq!(fx.llm.call_count(Purpose::SqlGeneration), 1);
}

// ---------------------------------------------------------------------------
// Fatal errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_catalog_is_fatal() {
    let fx = Fixture::new();
    let store = CatalogStore::new(fx.root.join("absent.json"), fx.root.join("database"));
    let workflow =
        Nl2SqlWorkflow::new(fx.llm.clone(), Arc::new(store), WorkflowConfig::default()).unwrap();

    let err = workflow
        .run(WorkflowInput::new("How many singers do we have?"))
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::Catalog(CatalogError::CatalogNotFound(_))));
    assert_eq!(fx.llm.total_calls(), 0);
}

#[tokio::test]
async fn unknown_selected_database_is_fatal() {
    let fx = Fixture::new();
    fx.llm.push_response(
        Purpose::SchemaSelection,
        r#"{"database": "world_1", "tables": ["city"], "reasoning": "guess"}"#,
    );

    let err = fx
        .workflow()
        .run(WorkflowInput::new("How many cities are there?"))
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::Catalog(CatalogError::DatabaseNotFound(_))));
}

#[tokio::test]
async fn unparseable_schema_selection_is_fatal() {
    let fx = Fixture::new();
    fx.llm
        .push_response(Purpose::SchemaSelection, "I think the singer table.");

    let events = collect(
        fx.workflow()
            .run_stream(WorkflowInput::new("How many singers do we have?")),
    )
    .await;
    assert!(matches!(events.last(), Some(WorkflowEvent::Failed { .. })));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
}

#[tokio::test]
async fn truncated_schema_selection_recovers_database() {
    let fx = Fixture::new();
    fx.llm
        .push_response(Purpose::SchemaSelection, r#"{"database": "concert_singer", "tables": ["sin"#)
        .push_response(Purpose::SqlGeneration, COUNT_REPLY)
        .always(Purpose::ReasoningEvaluation, EVAL_REPLY);

    let output = fx
        .workflow()
        .run(WorkflowInput::new("How many singers do we have?"))
        .await
        .unwrap();
    assert_eq!(output.status, Status::Success);
    assert_eq!(output.database, "concert_singer");
}

// ---------------------------------------------------------------------------
// Streaming
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stream_reports_every_step_in_order() {
    let fx = Fixture::new();
    fx.script_happy_path();
    fx.llm.push_response(Purpose::SqlGeneration, COUNT_REPLY);

    let events = collect(
        fx.workflow().run_stream(
            WorkflowInput::new("How many singers do we have?").with_natural_language(true),
        ),
    )
    .await;

    let ids: Vec<&str> = events.iter().filter_map(|e| e.executor_id()).collect();
    assert_eq!(
        &ids[..5],
        [
            "initialize_context",
            "schema_understanding",
            "sql_generation",
            "sql_reviewer",
            "handle_success"
        ]
    );
    let mut branches = ids[5..7].to_vec();
    branches.sort_unstable();
    assert_eq!(
        branches,
        ["evaluate_sql_reasoning", "generate_natural_language_response"]
    );
    assert_eq!(ids[7], "aggregate_success_results");
    assert_eq!(ids.len(), 8);

    assert_eq!(completed(&events).status, Status::Success);
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
}
