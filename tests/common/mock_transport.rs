//! Scripted transport and connector for bridge testing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use sitebridge::bridge::{BridgeError, TransportError, WorkerConnector, WorkerTransport};

/// Build a raw `tools/call` result value with a single text segment.
pub fn tool_result(text: &str, is_error: bool) -> Value {
    let mut result = json!({
        "content": [{ "type": "text", "text": text }],
    });
    if is_error {
        result["isError"] = json!(true);
    }
    result
}

/// Transport that replays a fixed queue of responses and records every call.
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<Value, TransportError>>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Result<Value, TransportError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every `(method, params)` pair seen so far.
    pub async fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl WorkerTransport for ScriptedTransport {
    async fn request(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Value, TransportError> {
        self.calls
            .lock()
            .await
            .push((method.to_string(), params));
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Process("no scripted response left".into())))
    }

    async fn notify(&self, _method: &str, _params: Value) -> Result<(), TransportError> {
        Ok(())
    }

    async fn is_alive(&self) -> bool {
        true
    }

    async fn close(&self) {}
}

/// Connector that counts connection attempts and yields a fixed outcome.
pub struct CountingConnector {
    pub attempts: Arc<AtomicUsize>,
    outcome: Result<Arc<ScriptedTransport>, BridgeError>,
}

impl CountingConnector {
    pub fn ok(transport: Arc<ScriptedTransport>) -> Self {
        Self {
            attempts: Arc::new(AtomicUsize::new(0)),
            outcome: Ok(transport),
        }
    }

    pub fn failing(error: BridgeError) -> Self {
        Self {
            attempts: Arc::new(AtomicUsize::new(0)),
            outcome: Err(error),
        }
    }
}

#[async_trait]
impl WorkerConnector for CountingConnector {
    async fn connect(&self) -> Result<Arc<dyn WorkerTransport>, BridgeError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        // Widen the race window so concurrent callers really do overlap.
        tokio::time::sleep(Duration::from_millis(10)).await;
        match &self.outcome {
            Ok(transport) => Ok(transport.clone()),
            Err(e) => Err(e.clone()),
        }
    }
}
