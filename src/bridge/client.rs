//! Worker bridge: process-wide memoized connection plus tool invocation.
//!
//! The first caller triggers resolution, spawn, and the initialize handshake;
//! everyone else awaits that same in-flight attempt. The outcome is cached
//! either way, so a failed boot stays failed until the process restarts
//! instead of respawning a broken worker on every request.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::envelope;
use crate::resolver::{launch_plan, ResolveError};

use super::transport::{StdioTransport, TransportError, WorkerTransport};
use super::types::{CallToolRequest, CallToolResult, Content, ListToolsResult, Tool};

/// Errors surfaced by the bridge.
///
/// All variants carry owned strings so a failure can be cached and cloned out
/// to every later caller.
#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    /// The worker installation could not be located or is incomplete.
    #[error("worker configuration error: {0}")]
    Configuration(String),
    /// Spawning or handshaking with the worker failed.
    #[error("worker connection error: {0}")]
    Connection(String),
    /// The tool itself reported a failure.
    #[error("{0}")]
    Tool(String),
    /// The worker replied with something the bridge cannot use.
    #[error("worker protocol error: {0}")]
    Protocol(String),
}

impl From<ResolveError> for BridgeError {
    fn from(err: ResolveError) -> Self {
        BridgeError::Configuration(err.to_string())
    }
}

impl From<TransportError> for BridgeError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Rpc(msg) => BridgeError::Protocol(msg),
            other => BridgeError::Connection(other.to_string()),
        }
    }
}

/// Strategy for establishing a worker connection.
///
/// Production uses [`StdioConnector`]; tests substitute scripted connectors
/// to observe connection counts and inject failures.
#[async_trait]
pub trait WorkerConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn WorkerTransport>, BridgeError>;
}

/// Connector that resolves the worker installation and spawns it over stdio.
pub struct StdioConnector {
    config: Config,
}

impl StdioConnector {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl WorkerConnector for StdioConnector {
    async fn connect(&self) -> Result<Arc<dyn WorkerTransport>, BridgeError> {
        let plan = launch_plan(&self.config)?;

        // Without an explicit binary override the entry point must exist;
        // handing an absent script to the OS produces a far worse error.
        if self.config.worker_exe_override.is_none() {
            let entry_abs = plan.worker_dir.join(&plan.entry_rel);
            if !entry_abs.is_file() {
                return Err(BridgeError::Configuration(format!(
                    "worker entry point not found: {}",
                    entry_abs.display()
                )));
            }
        }

        let mut env = HashMap::new();
        env.insert(
            "BASE_SERVICE_URL".to_string(),
            plan.base_service_url.clone(),
        );
        env.insert(
            "CRAWLER_USER_AGENT".to_string(),
            self.config.user_agent.clone(),
        );

        let transport = StdioTransport::spawn(&plan.exec_path, &plan.worker_dir, env)
            .map_err(BridgeError::from)?;
        transport.initialize().await?;

        // Best effort: surface the tool inventory in the log. A worker that
        // cannot list tools can often still call them.
        match transport.request("tools/list", serde_json::json!({})).await {
            Ok(result) => match serde_json::from_value::<ListToolsResult>(result) {
                Ok(listed) => {
                    let names: Vec<&str> = listed.tools.iter().map(|t| t.name.as_str()).collect();
                    info!(tools = ?names, "worker tools available");
                }
                Err(e) => warn!("could not parse tools/list result: {}", e),
            },
            Err(e) => warn!("tools/list failed: {}", e),
        }

        Ok(Arc::new(transport))
    }
}

/// Process-wide bridge to the worker.
pub struct WorkerBridge {
    connector: Box<dyn WorkerConnector>,
    slot: OnceCell<Result<Arc<dyn WorkerTransport>, BridgeError>>,
}

impl WorkerBridge {
    /// Bridge backed by the stdio connector.
    pub fn new(config: Config) -> Self {
        Self::with_connector(Box::new(StdioConnector::new(config)))
    }

    /// Bridge backed by an arbitrary connector.
    pub fn with_connector(connector: Box<dyn WorkerConnector>) -> Self {
        Self {
            connector,
            slot: OnceCell::new(),
        }
    }

    /// The memoized connection. First caller connects; concurrent callers
    /// await the same attempt; the outcome, success or failure, is cached.
    async fn connection(&self) -> Result<Arc<dyn WorkerTransport>, BridgeError> {
        self.slot
            .get_or_init(|| async {
                match self.connector.connect().await {
                    Ok(transport) => {
                        info!("worker connection established");
                        Ok(transport)
                    }
                    Err(e) => {
                        warn!("worker connection failed: {}", e);
                        Err(e)
                    }
                }
            })
            .await
            .clone()
    }

    /// Whether a connection attempt has already resolved, and how.
    pub fn connection_state(&self) -> Option<Result<(), BridgeError>> {
        self.slot.get().map(|r| r.as_ref().map(|_| ()).map_err(Clone::clone))
    }

    /// Call a worker tool and extract a JSON result.
    ///
    /// Worker-reported failures carry the first text segment with the
    /// `ERROR: ` sentinel stripped, so callers see the underlying message.
    /// Successful results prefer a native JSON segment; text segments go
    /// through the envelope extraction chain and never fail to parse.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: serde_json::Map<String, Value>,
    ) -> Result<Value, BridgeError> {
        let transport = self.connection().await?;

        let request = CallToolRequest {
            name: name.to_string(),
            arguments: Some(arguments),
        };
        let params = serde_json::to_value(&request)
            .map_err(|e| BridgeError::Protocol(format!("failed to encode tool call: {}", e)))?;

        debug!(tool = name, "invoking worker tool");
        let raw = transport.request("tools/call", params).await?;

        let result: CallToolResult = serde_json::from_value(raw)
            .map_err(|e| BridgeError::Protocol(format!("invalid tool result: {}", e)))?;

        if result.is_error.unwrap_or(false) {
            let message = first_text(&result)
                .map(|t| envelope::strip_error_sentinel(t).to_string())
                .unwrap_or_else(|| "tool reported an error".to_string());
            warn!(tool = name, error = %envelope::peek(&message), "worker tool failed");
            return Err(BridgeError::Tool(message));
        }

        // A native JSON segment wins over text extraction.
        for segment in &result.content {
            if let Content::Json(block) = segment {
                debug!(tool = name, result = %envelope::peek_value(&block.json), "worker tool result");
                return Ok(block.json.clone());
            }
        }

        match first_text(&result) {
            Some(text) => {
                let value = envelope::extract_or_wrap(text);
                debug!(tool = name, result = %envelope::peek_value(&value), "worker tool result");
                Ok(value)
            }
            None => Err(BridgeError::Protocol(
                "tool returned no usable content".to_string(),
            )),
        }
    }
}

fn first_text(result: &CallToolResult) -> Option<&str> {
    result.content.iter().find_map(|segment| match segment {
        Content::Text(t) => Some(t.text.as_str()),
        _ => None,
    })
}

/// Catalog of the tools the orchestrator may offer, fetched for diagnostics.
pub async fn list_worker_tools(bridge: &WorkerBridge) -> Result<Vec<Tool>, BridgeError> {
    let transport = bridge.connection().await?;
    let result = transport.request("tools/list", serde_json::json!({})).await?;
    let listed: ListToolsResult = serde_json::from_value(result)
        .map_err(|e| BridgeError::Protocol(format!("invalid tools/list result: {}", e)))?;
    Ok(listed.tools)
}
