//! Chat orchestration layer.

pub mod catalog;
pub mod fallback;
pub mod orchestrator;

pub use orchestrator::{
    ChatMessage, ChatOrchestrator, ChatRequest, ChatResponse, ChatRole, ToolCallSummary,
    MAX_TOOL_ROUNDS,
};
