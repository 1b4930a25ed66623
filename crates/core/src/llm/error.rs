use crate::llm::Provider;
use serde_json::Value;
use std::fmt;

/// Failure talking to a model, with the raw exchange kept for logging.
#[derive(Debug, Clone)]
pub struct LlmDiagnosticsError {
    pub provider: Provider,
    pub stage: &'static str,
    pub detail: String,
    pub raw_output: Option<String>,
    pub raw_response_json: Option<Value>,
}

impl LlmDiagnosticsError {
    /// Non-2xx reply. The body is kept verbatim and also parsed when it happens to be JSON.
    pub fn http(provider: Provider, status: reqwest::StatusCode, body: String) -> Self {
        Self {
            provider,
            stage: "http",
            detail: format!("status={status}"),
            raw_response_json: serde_json::from_str(&body).ok(),
            raw_output: Some(body),
        }
    }

    pub fn empty(provider: Provider) -> Self {
        Self {
            provider,
            stage: "empty",
            detail: "model returned no text".to_string(),
            raw_output: None,
            raw_response_json: None,
        }
    }

    /// Raw body cut down for a log line.
    pub fn output_excerpt(&self, max_chars: usize) -> Option<String> {
        self.raw_output
            .as_deref()
            .map(|s| s.chars().take(max_chars).collect())
    }
}

impl fmt::Display for LlmDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LLM error (provider={:?}, stage={}): {}",
            self.provider, self.stage, self.detail
        )
    }
}

impl std::error::Error for LlmDiagnosticsError {}
