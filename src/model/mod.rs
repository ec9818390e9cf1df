//! Reasoning-model client layer.

pub mod anthropic;
pub mod types;

pub use anthropic::AnthropicClient;
pub use types::{
    Block, CompletionRequest, CompletionResponse, Message, ModelError, ReasoningClient, Role,
    ToolChoice, ToolSpec,
};
