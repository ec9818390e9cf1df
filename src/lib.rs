//! Tool-orchestration bridge between a conversational agent and a
//! site-analysis worker.
//!
//! # Architecture
//!
//! - `config`: environment-driven configuration
//! - `resolver`: worker installation discovery and launch planning
//! - `envelope`: the `RESULT_JSON:` text envelope and `ERROR:` sentinel
//! - `bridge`: memoized stdio connection to the worker plus tool invocation
//! - `worker`: worker-side tool handlers, registry and stdio server
//! - `model`: reasoning-model client (messages API)
//! - `chat`: the tool-use loop, tool catalog and refusal fallback
//! - `health`: operator diagnostics for the whole chain

pub mod bridge;
pub mod chat;
pub mod config;
pub mod envelope;
pub mod health;
pub mod model;
pub mod resolver;
pub mod worker;

pub use bridge::{BridgeError, WorkerBridge};
pub use chat::{ChatOrchestrator, ChatRequest, ChatResponse};
pub use config::Config;
