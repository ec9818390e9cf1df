//! Worker-side implementation: tool handlers, registry and stdio server.

pub mod base;
pub mod registry;
pub mod server;
pub mod tools;

pub use base::{BaseServiceError, WorkerContext};
pub use registry::WorkerRegistry;
pub use tools::WorkerTool;
