//! Common test utilities for bridge and chat integration tests.

pub mod mock_model;
pub mod mock_transport;

pub use mock_model::ScriptedModel;
pub use mock_transport::{tool_result, CountingConnector, ScriptedTransport};
