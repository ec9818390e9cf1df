//! Anthropic messages API client.

use serde::Deserialize;

use super::types::{Block, CompletionRequest, CompletionResponse, ModelError, ReasoningClient};

const DEFAULT_API_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// HTTP client for the `/v1/messages` endpoint.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<Block>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl AnthropicClient {
    /// Create a client against the public API.
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_API_BASE_URL.to_string())
    }

    /// Create a client against a custom base URL (used by tests).
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl ReasoningClient for AnthropicClient {
    async fn create(&self, request: CompletionRequest) -> Result<CompletionResponse, ModelError> {
        let endpoint = format!("{}/v1/messages", self.base_url);

        let response = self
            .client
            .post(&endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelError::Request(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ModelError::Request(e.to_string()))?;

        tracing::debug!("messages API response: status={}", status);

        if status.as_u16() == 401 || status.as_u16() == 403 {
            let detail = serde_json::from_str::<ApiErrorBody>(&text)
                .ok()
                .and_then(|b| b.error)
                .map(|e| e.message)
                .unwrap_or(text);
            return Err(ModelError::Auth(format!(
                "authentication failed ({status}): {detail}"
            )));
        }
        if !status.is_success() {
            let detail = serde_json::from_str::<ApiErrorBody>(&text)
                .ok()
                .and_then(|b| b.error)
                .map(|e| e.message)
                .unwrap_or(text);
            return Err(ModelError::Request(format!(
                "messages API error {status}: {detail}"
            )));
        }

        let parsed: MessagesResponse = serde_json::from_str(&text)
            .map_err(|e| ModelError::InvalidResponse(format!("{e}: {text}")))?;

        Ok(CompletionResponse {
            content: parsed.content,
            stop_reason: parsed.stop_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::{Message, ToolChoice};
    use httpmock::prelude::*;
    use serde_json::json;

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "test-model".to_string(),
            max_tokens: 100,
            system: Some("be brief".to_string()),
            messages: vec![Message::user_text("hello")],
            tools: vec![],
            tool_choice: Some(ToolChoice::Auto),
        }
    }

    #[tokio::test]
    async fn create_parses_content_blocks() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/messages")
                .header("x-api-key", "key")
                .header("anthropic-version", API_VERSION);
            then.status(200).json_body(json!({
                "content": [
                    { "type": "text", "text": "hi" },
                    { "type": "tool_use", "id": "t1", "name": "crawl_site", "input": {} }
                ],
                "stop_reason": "tool_use"
            }));
        });

        let client = AnthropicClient::with_base_url("key".to_string(), server.base_url());
        let response = client.create(request()).await.unwrap();

        mock.assert();
        assert_eq!(response.joined_text(), "hi");
        assert_eq!(response.tool_uses().len(), 1);
        assert_eq!(response.stop_reason.as_deref(), Some("tool_use"));
    }

    #[tokio::test]
    async fn create_maps_auth_failures() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/messages");
            then.status(401)
                .json_body(json!({ "error": { "message": "invalid x-api-key" } }));
        });

        let client = AnthropicClient::with_base_url("bad".to_string(), server.base_url());
        let err = client.create(request()).await.unwrap_err();

        assert!(matches!(err, ModelError::Auth(_)));
        assert!(err.to_string().contains("invalid x-api-key"));
    }

    #[tokio::test]
    async fn create_maps_server_errors() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/messages");
            then.status(529)
                .json_body(json!({ "error": { "message": "overloaded" } }));
        });

        let client = AnthropicClient::with_base_url("key".to_string(), server.base_url());
        let err = client.create(request()).await.unwrap_err();

        assert!(matches!(err, ModelError::Request(_)));
        assert!(err.to_string().contains("overloaded"));
    }
}
