//! Types for the reasoning-model client.
//!
//! Mirrors the messages API wire shape: conversations are lists of messages,
//! each message a list of typed blocks. Tool use arrives as `tool_use` blocks
//! and results go back as `tool_result` blocks on the next user turn.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message sender role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One content block of a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Plain text.
    Text { text: String },
    /// The model asks for a tool invocation.
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    /// A tool result fed back to the model.
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

impl Block {
    pub fn text(text: impl Into<String>) -> Self {
        Block::Text { text: text.into() }
    }

    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Block::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error: None,
        }
    }
}

/// A single conversation message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<Block>,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![Block::text(text)],
        }
    }

    pub fn assistant(content: Vec<Block>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    pub fn user(content: Vec<Block>) -> Self {
        Self {
            role: Role::User,
            content,
        }
    }
}

/// A tool offered to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Tool-choice directive for a completion round.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model decides whether to call tools.
    Auto,
    /// Tool calls are disabled for this round.
    None,
}

/// A completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tools: Vec<ToolSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

/// A completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: Vec<Block>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

impl CompletionResponse {
    /// All text blocks joined into one string.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                Block::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Tool-use blocks in order of appearance.
    pub fn tool_uses(&self) -> Vec<(&str, &str, &Value)> {
        self.content
            .iter()
            .filter_map(|block| match block {
                Block::ToolUse { id, name, input } => {
                    Some((id.as_str(), name.as_str(), input))
                }
                _ => None,
            })
            .collect()
    }
}

/// Errors from model calls.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("auth error: {0}")]
    Auth(String),
}

/// Core trait for reasoning-model clients.
#[async_trait::async_trait]
pub trait ReasoningClient: Send + Sync {
    async fn create(&self, request: CompletionRequest) -> Result<CompletionResponse, ModelError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blocks_serialize_with_snake_case_tags() {
        let block = Block::ToolUse {
            id: "toolu_1".to_string(),
            name: "crawl_site".to_string(),
            input: json!({ "startUrl": "https://example.com" }),
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "tool_use");
        assert_eq!(json["input"]["startUrl"], "https://example.com");

        let result = Block::tool_result("toolu_1", "RESULT_JSON: ...");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["type"], "tool_result");
        assert_eq!(json["tool_use_id"], "toolu_1");
        assert!(json.get("is_error").is_none());
    }

    #[test]
    fn tool_choice_serializes_as_tagged_type() {
        assert_eq!(
            serde_json::to_value(ToolChoice::Auto).unwrap(),
            json!({ "type": "auto" })
        );
        assert_eq!(
            serde_json::to_value(ToolChoice::None).unwrap(),
            json!({ "type": "none" })
        );
    }

    #[test]
    fn response_helpers_pick_out_blocks() {
        let response = CompletionResponse {
            content: vec![
                Block::text("thinking..."),
                Block::ToolUse {
                    id: "t1".to_string(),
                    name: "audit_indexability".to_string(),
                    input: json!({ "urls": [] }),
                },
                Block::text("done"),
            ],
            stop_reason: Some("tool_use".to_string()),
        };

        assert_eq!(response.joined_text(), "thinking...\ndone");
        let uses = response.tool_uses();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].1, "audit_indexability");
    }
}
