//! Two-stage parsing of model output: strict JSON first, then best-effort
//! extraction of single fields from malformed text.

use crate::error::ParseError;
use regex::Regex;
use serde::de::DeserializeOwned;

/// The JSON body of a reply, with any markdown code fence removed.
pub fn strip_code_fences(response: &str) -> &str {
    let body = if response.contains("```json") {
        response
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .unwrap_or(response)
    } else if response.contains("```") {
        response.split("```").nth(1).unwrap_or(response)
    } else {
        response
    };
    body.trim()
}

/// Deserialize the reply as `T`.
pub fn parse_strict<T: DeserializeOwned>(response: &str) -> Result<T, ParseError> {
    serde_json::from_str(strip_code_fences(response)).map_err(|e| ParseError::Json {
        message: e.to_string(),
    })
}

/// Pull `"field": "value"` out of text that is not valid JSON.
pub fn extract_string_field(response: &str, field: &str) -> Result<String, ParseError> {
    let pattern = format!(r#""{}"\s*:\s*"([^"]+)""#, regex::escape(field));
    let re = Regex::new(&pattern).map_err(|e| ParseError::Json {
        message: e.to_string(),
    })?;
    re.captures(response)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| ParseError::MissingField(field.to_string()))
}
