use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Http(String),
    #[error("LLM API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },
    #[error("LLM response had no content")]
    EmptyResponse,
    #[error("LLM configuration error: {0}")]
    Config(String),
    #[error("scripted LLM: {0}")]
    Scripted(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        LlmError::Http(e.to_string())
    }
}

/// Failure to turn model output into a typed response.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("invalid JSON response: {message}")]
    Json { message: String },
    #[error("field `{0}` not found in response")]
    MissingField(String),
}
