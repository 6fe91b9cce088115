//! LLM clients: the `LlmClient` seam and an HTTP implementation covering
//! OpenAI-compatible chat completions, Bedrock bearer-token invoke and Ollama.

use crate::error::LlmError;
use crate::preview;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

// ============================================================
// Request
// ============================================================

/// Which workflow step issued a request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    SchemaSelection,
    SqlGeneration,
    ReasoningEvaluation,
    NaturalLanguage,
}

impl std::fmt::Display for Purpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Purpose::SchemaSelection => "schema_selection",
            Purpose::SqlGeneration => "sql_generation",
            Purpose::ReasoningEvaluation => "reasoning_evaluation",
            Purpose::NaturalLanguage => "natural_language",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LlmRequest {
    pub purpose: Purpose,
    pub system: String,
    pub user: String,
    /// Falls back to the client's configured temperature.
    pub temperature: Option<f32>,
    /// JSON schema the reply must follow; `None` for free text.
    pub response_schema: Option<Value>,
}

impl LlmRequest {
    pub fn new(purpose: Purpose, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            purpose,
            system: system.into(),
            user: user.into(),
            temperature: None,
            response_schema: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    /// System prompt with the response schema appended, when one is set.
    fn system_prompt(&self) -> String {
        match &self.response_schema {
            Some(schema) => format!(
                "{}\n\nRespond with a single JSON object matching this schema:\n{}",
                self.system,
                serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string())
            ),
            None => self.system.clone(),
        }
    }
}

/// Text-in, text-out model capability.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn invoke(&self, request: LlmRequest) -> Result<String, LlmError>;
}

// ============================================================
// Provider configuration
// ============================================================

#[derive(Debug, Clone)]
pub enum LlmProvider {
    BedrockApiKey { api_key: String, region: String },
    OpenAI { api_key: String, base_url: String },
    Local { endpoint: String },
}

impl LlmProvider {
    /// Pick a provider from environment variables, defaulting to local Ollama.
    pub fn from_env() -> Self {
        if let Ok(api_key) = std::env::var("AWS_BEARER_TOKEN_BEDROCK") {
            let region = std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".into());
            return Self::BedrockApiKey { api_key, region };
        }

        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            let base_url = std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".into());
            return Self::OpenAI { api_key, base_url };
        }

        if let Ok(endpoint) = std::env::var("LOCAL_LLM_ENDPOINT") {
            return Self::Local { endpoint };
        }

        Self::Local {
            endpoint: "http://localhost:11434".into(),
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::BedrockApiKey { .. } => "anthropic.claude-3-5-sonnet-20240620-v1:0",
            Self::OpenAI { .. } => "gpt-4o",
            Self::Local { .. } => "llama3.2",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::BedrockApiKey { .. } => "bedrock",
            Self::OpenAI { .. } => "openai",
            Self::Local { .. } => "local",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model_id: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Local {
                endpoint: "http://localhost:11434".into(),
            },
            model_id: "llama3.2".into(),
            temperature: 0.3,
            max_tokens: 4096,
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl LlmConfig {
    /// Provider from the environment; `NL2SQL_LLM_MODEL` overrides the model.
    pub fn from_env() -> Self {
        let provider = LlmProvider::from_env();
        let model_id = std::env::var("NL2SQL_LLM_MODEL")
            .unwrap_or_else(|_| provider.default_model().to_string());
        Self {
            provider,
            model_id,
            ..Default::default()
        }
    }
}

// ============================================================
// HTTP client
// ============================================================

pub struct HttpLlmClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl HttpLlmClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let base = match &config.provider {
            LlmProvider::OpenAI { base_url, .. } => Some(base_url),
            LlmProvider::Local { endpoint } => Some(endpoint),
            LlmProvider::BedrockApiKey { .. } => None,
        };
        if let Some(base) = base {
            url::Url::parse(base)
                .map_err(|e| LlmError::Config(format!("invalid endpoint {base}: {e}")))?;
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| LlmError::Config(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    async fn call_bedrock_bearer(
        &self,
        api_key: &str,
        region: &str,
        request: &LlmRequest,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let url = format!(
            "https://bedrock-runtime.{}.amazonaws.com/model/{}/invoke",
            region,
            urlencoding::encode(&self.config.model_id)
        );

        let body = serde_json::json!({
            "anthropic_version": "bedrock-2023-05-31",
            "max_tokens": self.config.max_tokens,
            "temperature": temperature,
            "system": request.system_prompt(),
            "messages": [{"role": "user", "content": request.user}]
        });

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;
        let result = read_json(response).await?;
        text_at(&result, &["content", "0", "text"])
    }

    async fn call_openai(
        &self,
        api_key: &str,
        base_url: &str,
        request: &LlmRequest,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let mut body = serde_json::json!({
            "model": self.config.model_id,
            "messages": [
                {"role": "system", "content": request.system_prompt()},
                {"role": "user", "content": request.user}
            ],
            "max_tokens": self.config.max_tokens,
            "temperature": temperature
        });
        if request.response_schema.is_some() {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }

        let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&body)
            .send()
            .await?;
        let result = read_json(response).await?;
        text_at(&result, &["choices", "0", "message", "content"])
    }

    async fn call_local(
        &self,
        endpoint: &str,
        request: &LlmRequest,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let mut body = serde_json::json!({
            "model": self.config.model_id,
            "prompt": request.user,
            "system": request.system_prompt(),
            "stream": false,
            "options": {
                "num_predict": self.config.max_tokens,
                "temperature": temperature
            }
        });
        if request.response_schema.is_some() {
            body["format"] = Value::String("json".into());
        }

        let url = format!("{}/api/generate", endpoint.trim_end_matches('/'));
        let response = self.http.post(&url).json(&body).send().await?;
        let result = read_json(response).await?;
        text_at(&result, &["response"])
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn invoke(&self, request: LlmRequest) -> Result<String, LlmError> {
        let temperature = request.temperature.unwrap_or(self.config.temperature);
        tracing::debug!(
            purpose = %request.purpose,
            provider = self.config.provider.name(),
            model = %self.config.model_id,
            prompt = %preview(&request.user, 500),
            "Invoking LLM"
        );

        let text = match &self.config.provider {
            LlmProvider::BedrockApiKey { api_key, region } => {
                self.call_bedrock_bearer(api_key, region, &request, temperature)
                    .await?
            }
            LlmProvider::OpenAI { api_key, base_url } => {
                self.call_openai(api_key, base_url, &request, temperature)
                    .await?
            }
            LlmProvider::Local { endpoint } => {
                self.call_local(endpoint, &request, temperature).await?
            }
        };

        tracing::debug!(purpose = %request.purpose, response = %preview(&text, 500), "LLM response");
        Ok(text)
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value, LlmError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json().await?)
}

/// String at a path of object keys / array indexes; empty text is an error.
fn text_at(value: &Value, path: &[&str]) -> Result<String, LlmError> {
    let mut cur = value;
    for key in path {
        cur = match key.parse::<usize>() {
            Ok(idx) => &cur[idx],
            Err(_) => &cur[*key],
        };
    }
    match cur.as_str() {
        Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
        _ => Err(LlmError::EmptyResponse),
    }
}
