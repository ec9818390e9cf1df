//! Stdio transport for the worker subprocess.
//!
//! The worker is a local child process speaking JSON-RPC 2.0 over
//! newline-delimited stdin/stdout. Worker stderr is drained into the log so a
//! crashing worker leaves a trail instead of a blocked pipe.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use super::types::{
    Implementation, InitializeRequest, InitializeResponse, ServerCapabilities,
};

/// Default request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors surfaced by transport operations.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("process error: {0}")]
    Process(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("worker error: {0}")]
    Rpc(String),
}

impl TransportError {
    pub fn connection<E: std::fmt::Display>(err: E) -> Self {
        TransportError::Connection(err.to_string())
    }

    pub fn io<E: std::fmt::Display>(err: E) -> Self {
        TransportError::Io(err.to_string())
    }

    pub fn serialization<E: std::fmt::Display>(err: E) -> Self {
        TransportError::Serialization(err.to_string())
    }
}

/// Async request interface over the worker pipe.
///
/// One implementation talks to a real subprocess; tests substitute scripted
/// transports behind the same trait.
#[async_trait]
pub trait WorkerTransport: Send + Sync {
    /// Send a JSON-RPC request and await the matching response result.
    async fn request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, TransportError>;

    /// Send a JSON-RPC notification (no reply expected).
    async fn notify(&self, method: &str, params: serde_json::Value)
        -> Result<(), TransportError>;

    /// Whether the underlying process is still running.
    async fn is_alive(&self) -> bool;

    /// Shut down the connection and reap the process.
    async fn close(&self);
}

/// Stdio transport over a spawned worker process.
pub struct StdioTransport {
    process: Arc<Mutex<Child>>,
    stdin: Arc<Mutex<tokio::process::ChildStdin>>,
    stdout: Arc<Mutex<BufReader<tokio::process::ChildStdout>>>,
    stderr_task: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
    /// Held for a full write-plus-read cycle so requests queue on the pipe.
    request_gate: Mutex<()>,
    next_id: Arc<AtomicI64>,
    timeout: Duration,
    command: String,
}

impl StdioTransport {
    /// Spawn the worker process and wrap its pipes.
    pub fn spawn(
        command: &std::path::Path,
        working_dir: &std::path::Path,
        env: HashMap<String, String>,
    ) -> Result<Self, TransportError> {
        info!(command = %command.display(), "spawning worker process");

        let mut cmd = Command::new(command);
        cmd.current_dir(working_dir)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| {
            TransportError::Process(format!(
                "failed to spawn worker '{}': {}",
                command.display(),
                e
            ))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Process("failed to capture stdout".to_string()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Process("failed to capture stdin".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| TransportError::Process("failed to capture stderr".to_string()))?;

        // Drain stderr so the worker never blocks on a full pipe.
        let stderr_task = tokio::spawn(async move {
            let reader = BufReader::new(stderr);
            let mut lines = reader.lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target: "worker", "{}", line);
            }
        });

        Ok(Self {
            process: Arc::new(Mutex::new(child)),
            stdin: Arc::new(Mutex::new(stdin)),
            stdout: Arc::new(Mutex::new(BufReader::new(stdout))),
            stderr_task: Arc::new(Mutex::new(Some(stderr_task))),
            request_gate: Mutex::new(()),
            next_id: Arc::new(AtomicI64::new(1)),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            command: command.display().to_string(),
        })
    }

    /// Run the `initialize` handshake and acknowledge it.
    pub async fn initialize(&self) -> Result<ServerCapabilities, TransportError> {
        let client_info = Implementation::new("sitebridge", env!("CARGO_PKG_VERSION"));
        let init_request = InitializeRequest::new(client_info);
        let params = serde_json::to_value(&init_request)
            .map_err(|e| TransportError::serialization(e.to_string()))?;

        let response = self.request_internal("initialize", params).await?;
        let init_response: InitializeResponse = serde_json::from_value(response)
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;

        if let Err(e) = self
            .notify("notifications/initialized", serde_json::json!({}))
            .await
        {
            warn!("failed to send initialized notification: {}", e);
        }

        info!(
            server = %init_response.server_info.name,
            version = %init_response.server_info.version,
            "worker handshake complete"
        );

        Ok(init_response.capabilities)
    }

    async fn request_internal(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, TransportError> {
        // The pipe carries no correlation beyond the id, so one request owns
        // it from write until the matching read. Concurrent callers queue
        // here; without the gate each reader consumes the other's response.
        let _gate = self.request_gate.lock().await;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        trace!("sending request: method={}, id={}", method, id);

        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        self.write_message(&request).await?;

        // Read responses until we find one with matching id; anything else on
        // the pipe is a notification and gets skipped.
        loop {
            let response = tokio::time::timeout(self.timeout, self.read_message())
                .await
                .map_err(|_| TransportError::Timeout(self.timeout))??;

            if let Some(response_id) = response.get("id") {
                let id_matches = response_id.as_i64() == Some(id)
                    || response_id.as_u64() == Some(id as u64)
                    || response_id.as_str().and_then(|s| s.parse::<i64>().ok()) == Some(id);

                if id_matches {
                    if let Some(error) = response.get("error") {
                        return Err(TransportError::Rpc(format!("{}", error)));
                    }
                    return Ok(response
                        .get("result")
                        .cloned()
                        .unwrap_or_else(|| serde_json::json!({})));
                }
            }

            trace!("skipping unmatched message: {:?}", response);
        }
    }

    async fn write_message(&self, message: &serde_json::Value) -> Result<(), TransportError> {
        let body = serde_json::to_string(message)
            .map_err(|e| TransportError::serialization(format!("failed to serialize: {}", e)))?;
        let framed = format!("{}\n", body);

        let mut stdin = self.stdin.lock().await;
        stdin
            .write_all(framed.as_bytes())
            .await
            .map_err(|e| TransportError::io(format!("failed to write message: {}", e)))?;
        stdin
            .flush()
            .await
            .map_err(|e| TransportError::io(format!("failed to flush: {}", e)))?;

        trace!("wrote message to stdin: {} bytes", framed.len());
        Ok(())
    }

    async fn read_message(&self) -> Result<serde_json::Value, TransportError> {
        let mut stdout = self.stdout.lock().await;
        let mut line = String::new();
        match stdout.read_line(&mut line).await {
            Ok(0) => {
                return Err(TransportError::Process(
                    "unexpected EOF while reading message".to_string(),
                ))
            }
            Ok(_) => {}
            Err(e) => return Err(TransportError::io(format!("failed to read message: {}", e))),
        }

        let response: serde_json::Value = serde_json::from_str(line.trim_end_matches(['\r', '\n']))
            .map_err(|e| TransportError::InvalidResponse(format!("failed to parse JSON: {}", e)))?;

        trace!("read message from stdout: {} bytes", line.len());
        Ok(response)
    }
}

#[async_trait]
impl WorkerTransport for StdioTransport {
    async fn request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, TransportError> {
        self.request_internal(method, params).await
    }

    async fn notify(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<(), TransportError> {
        trace!("sending notification: method={}", method);

        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });

        self.write_message(&notification).await
    }

    async fn is_alive(&self) -> bool {
        let mut process = self.process.lock().await;
        process.try_wait().ok().flatten().is_none()
    }

    async fn close(&self) {
        info!("closing worker transport for: {}", self.command);

        if let Some(task) = self.stderr_task.lock().await.take() {
            task.abort();
        }

        let mut process = self.process.lock().await;
        let _ = process.start_kill();
        let _ = process.wait().await;
    }
}
