//! HTTP client for the Messages API.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client as ReqwestClient, Response};
use tracing::{debug, info, instrument, warn};

use super::errors::ClaudeApiError;
use super::retry::RetryPolicy;
use super::types::{MessageRequest, MessageResponse};
use crate::domain::models::LlmConfig;
use crate::domain::ports::{CompletionRequest, LlmClient};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Configuration for the Claude HTTP client
#[derive(Debug, Clone)]
pub struct ClaudeClientConfig {
    /// Value of the `x-api-key` header
    pub api_key: String,
    /// API root, without trailing slash
    pub base_url: String,
    /// Model id sent with every request
    pub model: String,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_backoff_ms: u64,
    /// Ceiling on the retry delay
    pub max_backoff_ms: u64,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl ClaudeClientConfig {
    /// Build from application configuration; the API key must be set.
    pub fn from_llm_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .context("llm.api_key is not configured")?;

        Ok(Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            initial_backoff_ms: config.initial_backoff_ms,
            max_backoff_ms: config.max_backoff_ms,
            timeout_secs: 120,
        })
    }
}

/// HTTP client for the Claude Messages API
pub struct ClaudeClient {
    http_client: ReqwestClient,
    base_url: String,
    model: String,
    max_tokens: u32,
    retry_policy: RetryPolicy,
}

impl ClaudeClient {
    /// Build the client; fails if the HTTP client cannot be constructed.
    pub fn new(config: ClaudeClientConfig) -> Result<Self, ClaudeApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            "x-api-key",
            header::HeaderValue::from_str(&config.api_key)
                .map_err(|e| ClaudeApiError::InvalidRequest(format!("Invalid API key: {e}")))?,
        );
        headers.insert(
            "anthropic-version",
            header::HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let http_client = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .tcp_nodelay(true)
            .default_headers(headers)
            .build()?;

        info!(
            base_url = %config.base_url,
            model = %config.model,
            max_retries = config.max_retries,
            "Claude client initialized"
        );

        Ok(Self {
            http_client,
            base_url: config.base_url,
            model: config.model,
            max_tokens: config.max_tokens,
            retry_policy: RetryPolicy::new(
                config.max_retries,
                config.initial_backoff_ms,
                config.max_backoff_ms,
            ),
        })
    }

    /// Send a message request, retrying transient failures.
    #[instrument(skip(self, request), fields(model = %request.model, max_tokens = request.max_tokens))]
    pub async fn send_message(
        &self,
        request: &MessageRequest,
    ) -> Result<MessageResponse, ClaudeApiError> {
        let response = self
            .retry_policy
            .execute(|| self.execute_message_request(request))
            .await?;

        debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            stop_reason = ?response.stop_reason,
            "message request succeeded"
        );
        Ok(response)
    }

    async fn execute_message_request(
        &self,
        request: &MessageRequest,
    ) -> Result<MessageResponse, ClaudeApiError> {
        let response = self
            .http_client
            .post(format!("{}/v1/messages", self.base_url))
            .json(request)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    async fn handle_response(response: Response) -> Result<MessageResponse, ClaudeApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error body".to_string());
        warn!(%status, %body, "Claude API error");
        Err(ClaudeApiError::from_status(status, body))
    }
}

#[async_trait]
impl LlmClient for ClaudeClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let request = MessageRequest::from_completion(&self.model, self.max_tokens, request);
        let text = self.send_message(&request).await?.text();
        if text.trim().is_empty() {
            return Err(ClaudeApiError::EmptyCompletion.into());
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn test_config(base_url: String) -> ClaudeClientConfig {
        ClaudeClientConfig {
            api_key: "sk-test".to_string(),
            base_url,
            model: "claude-test".to_string(),
            max_tokens: 128,
            max_retries: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            timeout_secs: 5,
        }
    }

    fn response_body(text: &str) -> String {
        json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "claude-test",
            "content": [{"type": "text", "text": text}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_complete_sends_headers_and_prompt() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "sk-test")
            .match_header("anthropic-version", ANTHROPIC_VERSION)
            .match_body(Matcher::PartialJson(json!({
                "model": "claude-test",
                "max_tokens": 128,
                "system": "be brief",
                "messages": [{"role": "user", "content": "hello"}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(response_body("hi there"))
            .create_async()
            .await;

        let client = ClaudeClient::new(test_config(server.url())).unwrap();
        let text = client
            .complete(CompletionRequest::new("be brief", "hello"))
            .await
            .unwrap();

        assert_eq!(text, "hi there");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_retries_on_overload() {
        let mut server = Server::new_async().await;
        let overloaded = server
            .mock("POST", "/v1/messages")
            .with_status(529)
            .with_body(r#"{"error": {"type": "overloaded_error", "message": "Overloaded"}}"#)
            .expect(1)
            .create_async()
            .await;
        let success = server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(response_body("recovered"))
            .expect(1)
            .create_async()
            .await;

        let client = ClaudeClient::new(test_config(server.url())).unwrap();
        let text = client
            .complete(CompletionRequest::new("sys", "hello"))
            .await
            .unwrap();

        assert_eq!(text, "recovered");
        overloaded.assert_async().await;
        success.assert_async().await;
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .with_status(401)
            .with_body(r#"{"error": {"type": "authentication_error"}}"#)
            .expect(1)
            .create_async()
            .await;

        let client = ClaudeClient::new(test_config(server.url())).unwrap();
        let err = client
            .complete(CompletionRequest::new("sys", "hello"))
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ClaudeApiError>(),
            Some(ClaudeApiError::InvalidApiKey)
        ));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_blank_completion_is_an_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(response_body("   "))
            .create_async()
            .await;

        let client = ClaudeClient::new(test_config(server.url())).unwrap();
        let err = client
            .complete(CompletionRequest::new("sys", "hello"))
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ClaudeApiError>(),
            Some(ClaudeApiError::EmptyCompletion)
        ));
    }

    #[test]
    fn test_config_requires_api_key() {
        assert!(ClaudeClientConfig::from_llm_config(&LlmConfig::default()).is_err());

        let llm = LlmConfig {
            api_key: Some("sk-1".to_string()),
            base_url: "https://example.test/".to_string(),
            ..LlmConfig::default()
        };
        let config = ClaudeClientConfig::from_llm_config(&llm).unwrap();
        assert_eq!(config.base_url, "https://example.test");
        assert_eq!(config.model, llm.model);
    }
}
