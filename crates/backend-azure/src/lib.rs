//! Azure OpenAI chat-completions backend.
//!
//! Provides the `LlmBackend` trait and its Azure implementation. The
//! abstraction keeps the analysis pipeline backend-agnostic so tests can
//! inject deterministic stubs and other providers can be swapped in without
//! touching stage logic.

use markcounsel_model::CompletionRequest;
use std::future::Future;
use thiserror::Error;

/// Errors from LLM backend operations.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Backend not available")]
    Unavailable,
}

/// Trait for LLM completion backends.
///
/// The pipeline makes no assumption beyond "eventually returns or errors";
/// stage totality is handled above this layer.
pub trait LlmBackend {
    /// Run one completion for a system + user message pair.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<String, BackendError>> + Send;

    /// Check if the backend is reachable.
    fn health_check(&self) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Get the backend name for logging.
    fn name(&self) -> &'static str;
}

/// Azure OpenAI backend configuration.
#[derive(Debug, Clone)]
pub struct AzureOpenAiConfig {
    /// Resource endpoint, e.g. `https://myresource.openai.azure.com`
    pub endpoint: String,
    /// Deployment name of the chat model
    pub deployment: String,
    /// REST API version
    pub api_version: String,
    /// API key sent in the `api-key` header
    pub api_key: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for AzureOpenAiConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080".to_string(),
            deployment: "gpt-4o".to_string(),
            api_version: "2024-10-01-preview".to_string(),
            api_key: String::new(),
            timeout_secs: 120,
        }
    }
}

/// Azure OpenAI chat-completions backend.
pub struct AzureOpenAiBackend {
    config: AzureOpenAiConfig,
    client: reqwest::Client,
}

impl AzureOpenAiBackend {
    /// Create a new Azure backend.
    pub fn new(config: AzureOpenAiConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.deployment,
            self.config.api_version
        )
    }

    /// Build the chat-completions request body.
    fn build_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.user},
            ],
            "temperature": request.temperature,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        body
    }

    /// Pull the completion text out of a chat-completions response.
    fn parse_response(&self, response: serde_json::Value) -> Result<String, BackendError> {
        response
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| BackendError::ParseError("Missing choices content".to_string()))
    }
}

impl LlmBackend for AzureOpenAiBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        let url = self.completions_url();
        let body = self.build_body(request);

        tracing::debug!(
            deployment = %self.config.deployment,
            temperature = request.temperature,
            "Sending chat completion"
        );

        let response = self
            .client
            .post(&url)
            .header("api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::RequestFailed(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BackendError::ParseError(e.to_string()))?;

        self.parse_response(json)
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        // No cheap status endpoint on Azure OpenAI; a one-token completion
        // doubles as the reachability probe.
        let probe = CompletionRequest::new("Reply with OK.", "ping").with_max_tokens(1);
        match self.complete(&probe).await {
            Ok(_) => Ok(()),
            Err(BackendError::Connection(_)) => Err(BackendError::Unavailable),
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &'static str {
        "azure-openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> AzureOpenAiBackend {
        AzureOpenAiBackend::new(AzureOpenAiConfig {
            endpoint: "https://example.openai.azure.com/".to_string(),
            deployment: "gpt-4o".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_completions_url() {
        let url = backend().completions_url();
        assert_eq!(
            url,
            "https://example.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-10-01-preview"
        );
    }

    #[test]
    fn test_build_body() {
        let request = CompletionRequest::new("system text", "user text").with_max_tokens(200);
        let body = backend().build_body(&request);

        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "user text");
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["max_tokens"], 200);
    }

    #[test]
    fn test_build_body_omits_max_tokens() {
        let request = CompletionRequest::new("s", "u");
        let body = backend().build_body(&request);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_parse_response() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"ok\": true}"}}]
        });
        assert_eq!(backend().parse_response(json).unwrap(), "{\"ok\": true}");

        let empty = serde_json::json!({"choices": []});
        assert!(matches!(
            backend().parse_response(empty),
            Err(BackendError::ParseError(_))
        ));
    }
}
