//! Prompt templates for every model-backed step.

/// How query results were rendered for the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultFormat {
    Table,
    Single,
    Empty,
}

impl ResultFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultFormat::Table => "table",
            ResultFormat::Single => "single",
            ResultFormat::Empty => "empty",
        }
    }

    fn instruction(self) -> &'static str {
        match self {
            ResultFormat::Table => {
                "The results are a markdown table. Summarise the key findings and keep the \
                 table (or a shortened one) in your answer when it helps."
            }
            ResultFormat::Single => {
                "The result is a single value or record. Answer in one or two sentences and \
                 put the value in **bold**."
            }
            ResultFormat::Empty => {
                "The query returned no rows. Say that no matching data was found and suggest \
                 what the user could check."
            }
        }
    }
}

// ============================================================
// Schema understanding
// ============================================================

pub const SCHEMA_UNDERSTANDING_SYSTEM: &str = "You are a database expert. Given a catalog of \
databases and their tables, choose the single database that can answer the user's question and \
the tables the query will need. Only choose names that appear in the catalog.";

pub fn schema_understanding(
    question: &str,
    catalog_json: &str,
    database_hint: Option<&str>,
    tables_hint: Option<&[String]>,
) -> String {
    let mut hints = String::new();
    if let Some(db) = database_hint {
        hints.push_str(&format!("The user has already selected database `{db}`. Use it.\n"));
    }
    if let Some(tables) = tables_hint.filter(|t| !t.is_empty()) {
        hints.push_str(&format!(
            "The user has selected these tables: {}. Prefer them.\n",
            tables.join(", ")
        ));
    }

    format!(
        "Question: {question}\n\n{hints}Available databases and tables:\n{catalog_json}\n\n\
         Select the database and tables needed to answer the question."
    )
}

/// Schema re-selection after the previous choice produced a schema error.
pub fn semantic_error_correction(
    question: &str,
    database: &str,
    catalog_json: &str,
    failed_sql: Option<&str>,
    error_message: &str,
) -> String {
    let previous_db = if database.is_empty() { "(none)" } else { database };
    format!(
        "Question: {question}\n\n\
         The previous attempt used database `{previous_db}` and failed because the schema \
         selection looked wrong.\n\
         Failed SQL:\n{}\n\nError:\n{error_message}\n\n\
         Available databases and tables:\n{catalog_json}\n\n\
         Re-examine the catalog and select the database and tables that really answer the question.",
        failed_sql.unwrap_or("(no SQL generated)")
    )
}

// ============================================================
// SQL generation
// ============================================================

pub const SQL_GENERATION_SYSTEM: &str = "You are an expert SQLite developer. Write one read-only \
SQLite SELECT statement that answers the question using only the tables and columns in the \
schema. Explain your reasoning step by step and rate your confidence from 0 to 100; use a low \
confidence when the schema does not seem to fit the question.";

pub fn sql_generation(
    question: &str,
    detailed_schema: &str,
    selected_tables: Option<&[String]>,
) -> String {
    let table_hint = match selected_tables.filter(|t| !t.is_empty()) {
        Some(tables) => format!(
            "\nUse ONLY these tables: {}\n",
            tables.join(", ")
        ),
        None => String::new(),
    };
    format!(
        "Question: {question}\n{table_hint}\nDatabase schema:\n{detailed_schema}\n\n\
         Generate the SQL query."
    )
}

pub fn syntax_error_correction(
    question: &str,
    detailed_schema: &str,
    failed_sql: &str,
    error_message: &str,
) -> String {
    format!(
        "Question: {question}\n\nDatabase schema:\n{detailed_schema}\n\n\
         This SQL failed:\n{failed_sql}\n\nDatabase error:\n{error_message}\n\n\
         Fix the query. Keep the intent, correct the error."
    )
}

// ============================================================
// Reasoning evaluation
// ============================================================

pub const REASONING_EVALUATION_SYSTEM: &str = "You review text-to-SQL results. Decide whether \
the generated SQL and its stated reasoning are consistent with the question and with the \
results that were actually returned. Be specific in suggestions.";

pub struct EvaluationPrompt<'a> {
    pub question: &'a str,
    pub sql: &'a str,
    pub reasoning: &'a str,
    pub confidence: f64,
    pub formatted_results: &'a str,
    pub row_count: usize,
    pub execution_time_ms: f64,
    pub schema_subset: &'a str,
}

pub fn reasoning_evaluation(p: &EvaluationPrompt<'_>) -> String {
    format!(
        "Question: {}\n\nGenerated SQL:\n{}\n\nStated reasoning (confidence {}%):\n{}\n\n\
         Results ({} rows, {:.0}ms):\n{}\n\nSchema used:\n{}\n\n\
         Is the reasoning correct for this question and these results?",
        p.question,
        p.sql,
        p.confidence,
        p.reasoning,
        p.row_count,
        p.execution_time_ms,
        p.formatted_results,
        p.schema_subset,
    )
}

// ============================================================
// Natural-language response
// ============================================================

pub const NL_RESPONSE_SYSTEM: &str = "You answer questions about data. Reply in clear, \
conversational language using Markdown (bold, lists, tables) where it helps. Do not mention SQL \
unless asked.";

pub fn natural_language_response(
    question: &str,
    sql: &str,
    formatted_results: &str,
    format: ResultFormat,
) -> String {
    format!(
        "Question: {question}\n\nSQL:\n```sql\n{sql}\n```\n\nResults:\n{formatted_results}\n\n\
         {}\n\nAnswer the question based on these results.",
        format.instruction()
    )
}
