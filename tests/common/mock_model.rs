//! Scripted reasoning-model client for orchestrator testing.

use std::collections::VecDeque;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use sitebridge::model::{
    Block, CompletionRequest, CompletionResponse, ModelError, ReasoningClient,
};

/// Model client that replays scripted completions and records every request.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<CompletionResponse>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every completion request seen so far.
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    /// A completion carrying only text.
    pub fn text(text: &str) -> CompletionResponse {
        CompletionResponse {
            content: vec![Block::text(text)],
            stop_reason: Some("end_turn".to_string()),
        }
    }

    /// A completion requesting a single tool call.
    pub fn tool_use(id: &str, name: &str, input: Value) -> CompletionResponse {
        CompletionResponse {
            content: vec![Block::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
                input,
            }],
            stop_reason: Some("tool_use".to_string()),
        }
    }
}

#[async_trait]
impl ReasoningClient for ScriptedModel {
    async fn create(&self, request: CompletionRequest) -> Result<CompletionResponse, ModelError> {
        self.requests.lock().await.push(request);
        self.responses
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| ModelError::Request("no scripted completion left".to_string()))
    }
}
