//! Stdio JSON-RPC server loop for the worker.
//!
//! Protocol traffic owns stdout; all logging goes to stderr. Each request is
//! one line of JSON in, one line of JSON out.

use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::bridge::types::{
    CallToolRequest, Implementation, InitializeResponse, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, RequestId, ServerCapabilities, ToolsCapability,
    PROTOCOL_VERSION,
};

use super::base::WorkerContext;
use super::registry::WorkerRegistry;

/// Handle a single parsed request. Returns `None` for notifications.
pub async fn handle_request(
    registry: &WorkerRegistry,
    ctx: &WorkerContext,
    request: JsonRpcRequest,
) -> Option<JsonRpcResponse> {
    let id = match request.id {
        Some(id) => id,
        None => {
            debug!(method = %request.method, "notification received");
            return None;
        }
    };

    let response = match request.method.as_str() {
        "initialize" => {
            let result = InitializeResponse {
                protocol_version: PROTOCOL_VERSION.to_string(),
                capabilities: ServerCapabilities {
                    tools: Some(ToolsCapability {
                        list_changed: Some(false),
                    }),
                },
                server_info: Implementation::new("crawler-worker", env!("CARGO_PKG_VERSION")),
            };
            match serde_json::to_value(&result) {
                Ok(value) => JsonRpcResponse::success(id, value),
                Err(e) => JsonRpcResponse::error(id, JsonRpcError::internal_error(e.to_string())),
            }
        }
        "tools/list" => {
            let result = ListToolsResult {
                tools: registry.list(),
            };
            match serde_json::to_value(&result) {
                Ok(value) => JsonRpcResponse::success(id, value),
                Err(e) => JsonRpcResponse::error(id, JsonRpcError::internal_error(e.to_string())),
            }
        }
        "tools/call" => {
            let call: CallToolRequest = match request
                .params
                .ok_or_else(|| "missing params".to_string())
                .and_then(|p| serde_json::from_value(p).map_err(|e| e.to_string()))
            {
                Ok(call) => call,
                Err(e) => {
                    return Some(JsonRpcResponse::error(
                        id,
                        JsonRpcError::invalid_params(format!("invalid tools/call params: {}", e)),
                    ))
                }
            };

            let args = call.arguments.unwrap_or_default();
            match registry.call(ctx, &call.name, args).await {
                Some(result) => match serde_json::to_value(&result) {
                    Ok(value) => JsonRpcResponse::success(id, value),
                    Err(e) => {
                        JsonRpcResponse::error(id, JsonRpcError::internal_error(e.to_string()))
                    }
                },
                None => JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params(format!("unknown tool: {}", call.name)),
                ),
            }
        }
        other => JsonRpcResponse::error(id, JsonRpcError::method_not_found(other)),
    };

    Some(response)
}

/// Serve JSON-RPC over the given reader/writer until EOF.
pub async fn serve<R, W>(
    registry: &WorkerRegistry,
    ctx: &WorkerContext,
    reader: R,
    mut writer: W,
) -> std::io::Result<()>
where
    R: tokio::io::AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();

    info!(base_url = %ctx.base_url, user_agent = %ctx.user_agent, "worker serving on stdio");

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<JsonRpcRequest>(&line) {
            Ok(request) => handle_request(registry, ctx, request).await,
            Err(e) => {
                warn!("unparseable request line: {}", e);
                Some(JsonRpcResponse::error(
                    RequestId::Number(0),
                    JsonRpcError::parse_error(e.to_string()),
                ))
            }
        };

        if let Some(response) = response {
            let body = serde_json::to_string(&response)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            writer.write_all(body.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
    }

    info!("stdin closed, worker shutting down");
    Ok(())
}
