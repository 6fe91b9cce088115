use crate::state::AppState;
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use nq_catalog::{generate_catalog, write_catalog};
use nq_core::event::WorkflowEvent;
use nq_runner::WorkflowInput;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nl2sql")]
#[command(about = "Answer natural-language questions with SQL over SQLite databases", long_about = None)]
pub struct Cli {
    /// Directory holding m_schema.json and database/<db>/<db>.sqlite
    #[arg(long, global = true, env = "NL2SQL_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a question and print the final output as JSON
    Ask(QuestionArgs),
    /// Run a question and print one JSON event per line
    Stream(QuestionArgs),
    /// Manage the schema catalog
    Catalog {
        #[command(subcommand)]
        subcommand: CatalogCommands,
    },
}

#[derive(Args)]
struct QuestionArgs {
    /// The question to answer
    question: String,

    /// Database to query (skips database selection)
    #[arg(short, long)]
    database: Option<String>,

    /// Comma-separated tables; with --database, skips schema selection entirely
    #[arg(short, long, value_delimiter = ',')]
    tables: Option<Vec<String>>,

    /// Also produce a natural-language answer
    #[arg(long, default_value = "false")]
    nl: bool,
}

impl QuestionArgs {
    fn into_input(self) -> WorkflowInput {
        WorkflowInput {
            question: self.question,
            database: self.database,
            tables: self.tables,
            return_natural_language: self.nl,
        }
    }
}

#[derive(Subcommand)]
enum CatalogCommands {
    /// Introspect every database and write m_schema.json
    Generate {
        /// Distinct sample values recorded per column
        #[arg(long, default_value = "3")]
        samples: usize,
    },
    /// List available databases
    List,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let state = AppState::new(self.data_dir);
        match self.command {
            Commands::Ask(args) => ask(&state, args.into_input()).await,
            Commands::Stream(args) => stream(&state, args.into_input()).await,
            Commands::Catalog { subcommand } => match subcommand {
                CatalogCommands::Generate { samples } => generate(&state, samples).await,
                CatalogCommands::List => list(&state).await,
            },
        }
    }
}

async fn ask(state: &AppState, input: WorkflowInput) -> Result<()> {
    let workflow = state.workflow()?;
    let output = workflow.run(input).await.context("workflow failed")?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn stream(state: &AppState, input: WorkflowInput) -> Result<()> {
    let workflow = state.workflow()?;
    let mut rx = workflow.run_stream(input);

    let mut failed = None;
    while let Some(event) = rx.recv().await {
        println!("{}", serde_json::to_string(&event)?);
        if let WorkflowEvent::Failed { error, .. } = &event {
            failed = Some(error.clone());
        }
    }

    match failed {
        Some(error) => bail!("workflow failed: {error}"),
        None => Ok(()),
    }
}

async fn generate(state: &AppState, samples: usize) -> Result<()> {
    let dir = state.database_dir();
    let path = state.catalog_path();
    let catalog = tokio::task::spawn_blocking(move || -> Result<_> {
        let catalog = generate_catalog(&dir, samples)?;
        write_catalog(&catalog, &path)?;
        Ok(catalog)
    })
    .await??;

    println!(
        "Wrote {} database(s) to {}",
        catalog.len(),
        state.catalog_path().display()
    );
    Ok(())
}

async fn list(state: &AppState) -> Result<()> {
    let store = state.catalog_store();
    for name in store.list_databases().await? {
        println!("{name}");
    }
    Ok(())
}
