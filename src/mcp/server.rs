//! MCP Server Implementation
//!
//! Line-delimited JSON-RPC over any async reader/writer pair; stdio in
//! production. Every registered tool of the [`ToolRegistry`] is exposed.

use anyhow::{Result, anyhow};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::RagError;
use crate::mcp::protocol::*;
use crate::tools::ToolRegistry;

/// MCP Server state and configuration
pub struct McpServer {
    server_info: Implementation,
    registry: Arc<ToolRegistry>,
    connection_state: Arc<RwLock<ConnectionState>>,
}

/// Connection state tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

/// Dispatches decoded messages to the server
pub struct MessageHandler {
    server: Arc<McpServer>,
}

impl McpServer {
    #[inline]
    pub fn new(name: impl Into<String>, version: impl Into<String>, registry: ToolRegistry) -> Self {
        Self {
            server_info: Implementation {
                name: name.into(),
                version: version.into(),
            },
            registry: Arc::new(registry),
            connection_state: Arc::new(RwLock::new(ConnectionState::Uninitialized)),
        }
    }

    #[inline]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Serve on stdin/stdout until stdin closes
    #[inline]
    pub async fn serve_stdio(self: Arc<Self>) -> Result<()> {
        info!("Starting MCP server with stdio transport");
        self.serve(BufReader::new(io::stdin()), io::stdout()).await
    }

    /// Serve one connection until the reader reaches EOF
    #[inline]
    pub async fn serve<R, W>(self: Arc<Self>, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let handler = MessageHandler::new(Arc::clone(&self));
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    info!("EOF reached, closing connection");
                    break;
                }
                Ok(_) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if let Some(reply) = handler.handle_line(line).await {
                        send_message(&mut writer, &reply).await?;
                    }
                }
                Err(e) => {
                    error!("Error reading from input: {}", e);
                    break;
                }
            }
        }

        *self.connection_state.write().await = ConnectionState::Closed;
        info!("MCP server stopped");
        Ok(())
    }

    #[inline]
    pub async fn connection_state(&self) -> ConnectionState {
        *self.connection_state.read().await
    }
}

impl MessageHandler {
    #[inline]
    pub fn new(server: Arc<McpServer>) -> Self {
        Self { server }
    }

    /// Decode and handle one line; returns the reply to send, if any
    #[inline]
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcMessage> {
        let raw: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                error!("Failed to parse JSON: {}", e);
                return Some(error_message(JsonRpcError::parse_error(), None));
            }
        };

        match decode_message(raw) {
            Ok(message) => self.process_message(message).await,
            Err(e) => {
                error!("Message validation failed: {}", e);
                Some(error_message(JsonRpcError::invalid_request(), None))
            }
        }
    }

    #[inline]
    pub async fn process_message(&self, message: JsonRpcMessage) -> Option<JsonRpcMessage> {
        match message {
            JsonRpcMessage::Request(request) => Some(self.handle_request(request).await),
            JsonRpcMessage::Notification(notification) => {
                self.handle_notification(notification).await;
                None
            }
            JsonRpcMessage::Response(_) | JsonRpcMessage::ErrorResponse(_) => {
                warn!("Received unexpected response message from client");
                None
            }
        }
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcMessage {
        debug!("Handling request {}", request.method);
        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params).await,
            "tools/list" => self.handle_list_tools(),
            "tools/call" => self.handle_call_tool(request.params).await,
            "ping" => Ok(Value::Object(Map::new())),
            method => {
                warn!("Unknown method: {}", method);
                return error_message(JsonRpcError::method_not_found(method), Some(request.id));
            }
        };

        match response {
            Ok(result) => JsonRpcMessage::Response(JsonRpcResponse::new(result, request.id)),
            Err(error) => {
                error!("Error handling request {}: {}", request.method, error.message);
                error_message(error, Some(request.id))
            }
        }
    }

    async fn handle_notification(&self, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            "notifications/initialized" | "initialized" => {
                *self.server.connection_state.write().await = ConnectionState::Ready;
                info!("Server ready to handle requests");
            }
            "notifications/cancelled" => {
                debug!("Received cancellation notification");
            }
            method => {
                warn!("Unknown notification method: {}", method);
            }
        }
    }

    async fn handle_initialize(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: InitializeParams = params
            .ok_or_else(|| JsonRpcError::invalid_params("Initialize request missing parameters".to_string()))
            .and_then(|p| {
                serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(e.to_string()))
            })?;

        if !SUPPORTED_VERSIONS.contains(&params.protocol_version.as_str()) {
            return Err(JsonRpcError::internal_error(format!(
                "Unsupported protocol version: {}. Supported: {}",
                params.protocol_version,
                SUPPORTED_VERSIONS.join(", ")
            )));
        }

        *self.server.connection_state.write().await = ConnectionState::Initializing;

        let result = InitializeResult {
            protocol_version: params.protocol_version,
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    list_changed: false,
                },
            },
            server_info: self.server.server_info.clone(),
            instructions: Some(
                "Project knowledge tools: semantic document search, file access, SQL queries and the current time"
                    .to_string(),
            ),
        };

        info!("Client initialized: {}", params.client_info.name);
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(e.to_string()))
    }

    fn handle_list_tools(&self) -> Result<Value, JsonRpcError> {
        let result = ListToolsResult {
            tools: self.server.registry.definitions(),
        };
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(e.to_string()))
    }

    async fn handle_call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: CallToolParams = params
            .ok_or_else(|| JsonRpcError::invalid_params("Tool call request missing parameters".to_string()))
            .and_then(|p| {
                serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(e.to_string()))
            })?;

        let arguments = params.arguments.unwrap_or_default();
        let result = self
            .server
            .registry
            .call(&params.name, &arguments)
            .await
            .map_err(|e| match e {
                RagError::Tool(message) => JsonRpcError::internal_error(message),
                other => JsonRpcError::internal_error(other.to_string()),
            })?;

        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(e.to_string()))
    }
}

/// Accept only well-formed JSON-RPC 2.0 messages
fn decode_message(raw: Value) -> Result<JsonRpcMessage> {
    let message: JsonRpcMessage = serde_json::from_value(raw)
        .map_err(|_| anyhow!("Value does not match any known JSON-RPC message type"))?;

    let version = match &message {
        JsonRpcMessage::Request(request) => &request.jsonrpc,
        JsonRpcMessage::Response(response) => &response.jsonrpc,
        JsonRpcMessage::ErrorResponse(response) => &response.jsonrpc,
        JsonRpcMessage::Notification(notification) => &notification.jsonrpc,
    };
    if version != JSONRPC_VERSION {
        return Err(anyhow!("Unsupported JSON-RPC version: {}", version));
    }
    Ok(message)
}

fn error_message(error: JsonRpcError, id: Option<RequestId>) -> JsonRpcMessage {
    JsonRpcMessage::ErrorResponse(JsonRpcErrorResponse::new(error, id))
}

async fn send_message<W>(writer: &mut W, message: &JsonRpcMessage) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let json = serde_json::to_string(message)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
