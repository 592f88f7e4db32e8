//! MCP server with stdio transport
//!
//! Speaks newline-delimited JSON-RPC 2.0. A review can block for minutes, so
//! each request is handled on its own task and responses are written as they
//! complete; ids let the client match them up.

use super::protocol::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, ToolCallParams, ToolCallResult,
    JSONRPC_VERSION, MCP_PROTOCOL_VERSION, TOOL_EXECUTION_ERROR,
};
use super::tools::ToolHandler;
use crate::error::Result;
use serde::Deserialize;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// MCP server that handles JSON-RPC requests over stdio
pub struct McpServer {
    tool_handler: Arc<ToolHandler>,
}

impl McpServer {
    pub fn new(tool_handler: ToolHandler) -> Self {
        Self {
            tool_handler: Arc::new(tool_handler),
        }
    }

    /// Run on stdin/stdout until the client closes stdin
    pub async fn run(&self) -> Result<()> {
        self.run_with(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Run on arbitrary transport halves
    ///
    /// At EOF every queued request is still answered, except `tools/call`:
    /// a review can block until its deadline, so those are cancelled and
    /// their sessions expire on their own.
    pub async fn run_with<R, W>(&self, mut reader: R, writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        info!("MCP server started, listening on stdin...");

        let (tx, rx) = mpsc::unbounded_channel::<String>();
        let writer_task = tokio::spawn(write_responses(rx, writer));
        let mut requests = JoinSet::new();
        let mut tool_calls = JoinSet::new();

        let mut line = String::new();
        loop {
            line.clear();

            match reader.read_line(&mut line).await {
                Ok(0) => {
                    debug!("Received EOF, shutting down");
                    break;
                }
                Ok(_) => {
                    let request = line.trim().to_string();
                    if request.is_empty() {
                        continue;
                    }
                    debug!("Received request: {}", request);

                    let set = if is_tool_call(&request) {
                        &mut tool_calls
                    } else {
                        &mut requests
                    };
                    let handler = Arc::clone(&self.tool_handler);
                    let tx = tx.clone();
                    set.spawn(async move {
                        if let Some(response) = process_request(&handler, &request).await {
                            match serde_json::to_string(&response) {
                                Ok(json) => {
                                    let _ = tx.send(json);
                                }
                                Err(e) => error!("Failed to serialize response: {}", e),
                            }
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to read from stdin: {}", e);
                    break;
                }
            }

            // Reap finished handlers so the sets do not grow unbounded
            while requests.try_join_next().is_some() {}
            while tool_calls.try_join_next().is_some() {}
        }

        if !tool_calls.is_empty() {
            debug!("Cancelling {} pending tool calls", tool_calls.len());
        }
        tool_calls.shutdown().await;
        while requests.join_next().await.is_some() {}

        drop(tx);
        if let Err(e) = writer_task.await {
            error!("Response writer panicked: {}", e);
        }

        info!("MCP server shutting down");
        Ok(())
    }
}

#[derive(Deserialize)]
struct MethodOnly {
    method: String,
}

fn is_tool_call(line: &str) -> bool {
    serde_json::from_str::<MethodOnly>(line)
        .map(|m| m.method == "tools/call")
        .unwrap_or(false)
}

async fn write_responses<W>(mut rx: mpsc::UnboundedReceiver<String>, mut writer: W)
where
    W: AsyncWrite + Unpin,
{
    while let Some(json) = rx.recv().await {
        debug!("Sending response: {}", json);

        let written = async {
            writer.write_all(json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        }
        .await;

        if let Err(e) = written {
            error!("Failed to write response: {}", e);
            break;
        }
    }
}

/// Process a single JSON-RPC message; notifications yield no response
pub(crate) async fn process_request(handler: &ToolHandler, line: &str) -> Option<JsonRpcResponse> {
    let request: JsonRpcRequest = match serde_json::from_str(line) {
        Ok(req) => req,
        Err(e) => {
            return Some(JsonRpcResponse::error(
                None,
                JsonRpcError::parse_error(format!("Invalid JSON: {}", e)),
            ));
        }
    };

    if request.jsonrpc != JSONRPC_VERSION {
        return Some(JsonRpcResponse::error(
            request.id,
            JsonRpcError::invalid_request("jsonrpc must be '2.0'"),
        ));
    }

    if request.is_notification() {
        debug!("Ignoring notification: {}", request.method);
        return None;
    }

    let response = match request.method.as_str() {
        "initialize" => handle_initialize(request),
        "ping" => JsonRpcResponse::success(request.id, serde_json::json!({})),
        "tools/list" => handle_tools_list(handler, request),
        "tools/call" => handle_tools_call(handler, request).await,
        _ => JsonRpcResponse::error(request.id, JsonRpcError::method_not_found(&request.method)),
    };
    Some(response)
}

fn handle_initialize(request: JsonRpcRequest) -> JsonRpcResponse {
    debug!("Handling initialize");

    JsonRpcResponse::success(
        request.id,
        serde_json::json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "serverInfo": {
                "name": "interlude",
                "version": env!("CARGO_PKG_VERSION")
            },
            "capabilities": {
                "tools": {}
            }
        }),
    )
}

fn handle_tools_list(handler: &ToolHandler, request: JsonRpcRequest) -> JsonRpcResponse {
    debug!("Handling tools/list");

    JsonRpcResponse::success(
        request.id,
        serde_json::json!({ "tools": handler.list_tools() }),
    )
}

async fn handle_tools_call(handler: &ToolHandler, request: JsonRpcRequest) -> JsonRpcResponse {
    let params: ToolCallParams = match serde_json::from_value(request.params) {
        Ok(params) => params,
        Err(e) => {
            return JsonRpcResponse::error(
                request.id,
                JsonRpcError::invalid_params(format!("Invalid tools/call params: {}", e)),
            );
        }
    };
    debug!("Handling tools/call: {}", params.name);

    match handler.execute(&params.name, params.arguments).await {
        Ok(result) => {
            let text = serde_json::to_string_pretty(&result).unwrap_or_else(|_| result.to_string());
            match serde_json::to_value(ToolCallResult::text(text)) {
                Ok(value) => JsonRpcResponse::success(request.id, value),
                Err(e) => JsonRpcResponse::error(
                    request.id,
                    JsonRpcError::internal_error(format!("Serialization error: {}", e)),
                ),
            }
        }
        Err(e) => {
            error!("Tool execution failed: {}", e);
            JsonRpcResponse::error(
                request.id,
                JsonRpcError::new(TOOL_EXECUTION_ERROR, e.to_string()),
            )
        }
    }
}
