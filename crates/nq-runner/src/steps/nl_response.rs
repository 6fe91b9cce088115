//! Natural-Language Response: prose answer over the formatted results.

use crate::context::RunContext;
use crate::workflow::Nl2SqlWorkflow;
use nq_llm::prompts::{self, NL_RESPONSE_SYSTEM};
use nq_llm::{preview, LlmRequest, Purpose};

const NL_TEMPERATURE: f32 = 0.7;

/// `None` when no answer was requested or there are no rows. LLM failures
/// fall back to a row count.
pub async fn generate_natural_language_response(
    workflow: &Nl2SqlWorkflow,
    ctx: &RunContext,
) -> Option<String> {
    if !ctx.return_natural_language() {
        tracing::info!("Natural language response not requested");
        return None;
    }
    let snapshot = ctx.success().await?;
    let msg = &snapshot.message;
    let row_count = msg.result_rows.as_ref().map_or(0, Vec::len);
    if row_count == 0 {
        tracing::info!("No rows, skipping natural language response");
        return None;
    }

    tracing::info!(format = snapshot.format.as_str(), "Generating natural language response");
    let prompt = prompts::natural_language_response(
        &msg.question,
        msg.sql.as_deref().unwrap_or_default(),
        &snapshot.formatted_results,
        snapshot.format,
    );
    let request = LlmRequest::new(Purpose::NaturalLanguage, NL_RESPONSE_SYSTEM, prompt)
        .with_temperature(NL_TEMPERATURE);

    match workflow.llm.invoke(request).await {
        Ok(text) if !text.trim().is_empty() => {
            tracing::info!(response = %preview(&text, 100), "Natural language response generated");
            Some(text.trim().to_string())
        }
        Ok(_) => {
            tracing::warn!("Empty natural language response, using fallback");
            Some(fallback(row_count))
        }
        Err(e) => {
            tracing::warn!("Failed to generate natural language response: {e}");
            Some(fallback(row_count))
        }
    }
}

fn fallback(row_count: usize) -> String {
    format!("Found {row_count} result(s).")
}
