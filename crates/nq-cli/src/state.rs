//! Data locations and service wiring shared by all commands.

use anyhow::{Context, Result};
use nq_catalog::{CatalogStore, DatabaseDir};
use nq_llm::{HttpLlmClient, LlmConfig};
use nq_policy::WorkflowConfig;
use nq_runner::Nl2SqlWorkflow;
use std::path::PathBuf;
use std::sync::Arc;

pub const CATALOG_FILE: &str = "m_schema.json";
pub const DATABASE_DIR: &str = "database";

/// `<data>/m_schema.json` plus `<data>/database/<db>/<db>.sqlite`.
pub struct AppState {
    pub data_dir: PathBuf,
}

impl AppState {
    pub fn new(data_dir: Option<PathBuf>) -> Self {
        let data_dir = data_dir
            .or_else(|| dirs::data_dir().map(|p| p.join("nl2sql")))
            .unwrap_or_else(|| PathBuf::from("."));
        tracing::debug!(data_dir = %data_dir.display(), "Using data directory");
        Self { data_dir }
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join(CATALOG_FILE)
    }

    pub fn database_root(&self) -> PathBuf {
        self.data_dir.join(DATABASE_DIR)
    }

    pub fn database_dir(&self) -> DatabaseDir {
        DatabaseDir::new(self.database_root())
    }

    pub fn catalog_store(&self) -> CatalogStore {
        CatalogStore::new(self.catalog_path(), self.database_root())
    }

    /// Workflow wired to the HTTP model client picked from the environment.
    pub fn workflow(&self) -> Result<Nl2SqlWorkflow> {
        let llm_config = LlmConfig::from_env();
        tracing::info!(
            provider = llm_config.provider.name(),
            model = %llm_config.model_id,
            "LLM configured"
        );
        let llm = HttpLlmClient::new(llm_config).context("failed to build LLM client")?;

        let config = WorkflowConfig::from_env();
        Nl2SqlWorkflow::new(Arc::new(llm), Arc::new(self.catalog_store()), config)
            .context("invalid workflow configuration")
    }
}
