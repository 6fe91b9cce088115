//! Run Context: state shared by every step of one workflow run.
//!
//! Large payloads (the catalog, detailed schemas, the last generation, the
//! formatted results) live here so that the routed `WorkflowMessage` stays
//! small. Nothing in here outlives the run.

use nq_core::message::WorkflowMessage;
use nq_core::schema::{Catalog, SchemaContext};
use nq_llm::prompts::ResultFormat;
use nq_llm::SqlGeneration;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// The approved message plus its single rendering, shared by both branches
/// of the success fan-out.
#[derive(Debug, Clone)]
pub struct SuccessSnapshot {
    pub message: WorkflowMessage,
    pub formatted_results: String,
    pub format: ResultFormat,
}

#[derive(Debug)]
pub struct RunContext {
    pub run_id: Uuid,
    catalog: Arc<Catalog>,
    return_natural_language: bool,
    /// Schema contexts by id. Never overwritten; a retry adds a new one.
    schemas: Arc<RwLock<HashMap<String, SchemaContext>>>,
    current_schema_id: Arc<RwLock<Option<String>>>,
    sql_response: Arc<RwLock<Option<SqlGeneration>>>,
    success: Arc<RwLock<Option<SuccessSnapshot>>>,
}

impl RunContext {
    pub fn new(run_id: Uuid, catalog: Arc<Catalog>, return_natural_language: bool) -> Self {
        Self {
            run_id,
            catalog,
            return_natural_language,
            schemas: Arc::new(RwLock::new(HashMap::new())),
            current_schema_id: Arc::new(RwLock::new(None)),
            sql_response: Arc::new(RwLock::new(None)),
            success: Arc::new(RwLock::new(None)),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn return_natural_language(&self) -> bool {
        self.return_natural_language
    }

    /// Store a schema context under its id and make it current.
    pub async fn put_schema(&self, schema: SchemaContext) {
        let id = schema.context_id.clone();
        self.schemas.write().await.insert(id.clone(), schema);
        *self.current_schema_id.write().await = Some(id);
    }

    pub async fn schema(&self, id: &str) -> Option<SchemaContext> {
        self.schemas.read().await.get(id).cloned()
    }

    pub async fn current_schema(&self) -> Option<SchemaContext> {
        let id = self.current_schema_id.read().await.clone()?;
        self.schema(&id).await
    }

    pub async fn schema_count(&self) -> usize {
        self.schemas.read().await.len()
    }

    pub async fn set_sql_response(&self, response: SqlGeneration) {
        *self.sql_response.write().await = Some(response);
    }

    pub async fn sql_response(&self) -> Option<SqlGeneration> {
        self.sql_response.read().await.clone()
    }

    pub async fn set_success(&self, snapshot: SuccessSnapshot) {
        *self.success.write().await = Some(snapshot);
    }

    pub async fn success(&self) -> Option<SuccessSnapshot> {
        self.success.read().await.clone()
    }
}
