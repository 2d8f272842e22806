//! JSON-RPC 2.0 server over stdio.
//!
//! Stateless by contract: no session ids are issued, and every request is
//! self-contained.

use super::handlers::ToolHandler;
use super::protocol::*;
use super::tools::all_tools;
use crate::AppState;
use anyhow::Result;
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use tracing::{debug, error, info, warn};

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "workgraph";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct McpServer {
    tool_handler: ToolHandler,
    initialized: bool,
}

impl McpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            tool_handler: ToolHandler::new(state),
            initialized: false,
        }
    }

    /// Run the server, reading requests from stdin and writing responses to
    /// stdout, one JSON document per line.
    pub async fn run(&mut self) -> Result<()> {
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        let reader = BufReader::new(stdin.lock());
        let mut writer = stdout.lock();

        info!("MCP server starting on stdio");

        for line in reader.lines() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    error!("failed to read line: {}", e);
                    break;
                }
            };
            if line.is_empty() {
                continue;
            }
            debug!("received: {}", line);

            if let Some(resp) = self.handle_message(&line).await {
                let json = serde_json::to_string(&resp)?;
                debug!("sending: {}", json);
                writeln!(writer, "{}", json)?;
                writer.flush()?;
            }
        }

        info!("MCP server shutting down");
        Ok(())
    }

    async fn handle_message(&mut self, message: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(message) {
            Ok(r) => r,
            Err(e) => {
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    JsonRpcError::parse_error(e.to_string()),
                ));
            }
        };

        let id = match &request.id {
            Some(id) => id.clone(),
            None => {
                self.handle_notification(&request);
                return None;
            }
        };

        let result = self.handle_request(&request).await;
        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(error) => JsonRpcResponse::error(id, error),
        })
    }

    fn handle_notification(&mut self, request: &JsonRpcRequest) {
        match request.method.as_str() {
            "notifications/initialized" => {
                info!("client confirmed initialization");
            }
            "notifications/cancelled" => {
                warn!("request cancelled by client");
            }
            _ => {
                debug!("unknown notification: {}", request.method);
            }
        }
    }

    async fn handle_request(&mut self, request: &JsonRpcRequest) -> Result<Value, JsonRpcError> {
        match request.method.as_str() {
            "initialize" => self.handle_initialize(&request.params),
            "ping" => Ok(json!({})),
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(&request.params).await,
            _ => Err(JsonRpcError::method_not_found(&request.method)),
        }
    }

    fn handle_initialize(&mut self, params: &Option<Value>) -> Result<Value, JsonRpcError> {
        let params: Option<InitializeParams> = params
            .as_ref()
            .map(|p| serde_json::from_value(p.clone()))
            .transpose()
            .map_err(|e| JsonRpcError::invalid_params(e.to_string()))?;

        if let Some(params) = &params {
            info!(
                "initializing (client protocol: {})",
                params.protocol_version
            );
            if let Some(client) = &params.client_info {
                info!(
                    "client: {} v{}",
                    client.name,
                    client.version.as_deref().unwrap_or("unknown")
                );
            }
        }

        self.initialized = true;

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    list_changed: false,
                },
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
        };
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(e.to_string()))
    }

    fn handle_tools_list(&self) -> Result<Value, JsonRpcError> {
        if !self.initialized {
            return Err(JsonRpcError::invalid_request("server not initialized"));
        }
        let result = ToolsListResult { tools: all_tools() };
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(e.to_string()))
    }

    async fn handle_tools_call(&self, params: &Option<Value>) -> Result<Value, JsonRpcError> {
        if !self.initialized {
            return Err(JsonRpcError::invalid_request("server not initialized"));
        }
        let params: ToolCallParams = serde_json::from_value(
            params
                .as_ref()
                .ok_or_else(|| JsonRpcError::invalid_params("params required"))?
                .clone(),
        )
        .map_err(|e| JsonRpcError::invalid_params(e.to_string()))?;

        info!("tool call: {}", params.name);
        debug!("arguments: {:?}", params.arguments);

        let tool_result = match self
            .tool_handler
            .handle(&params.name, params.arguments)
            .await
        {
            Ok(value) => ToolCallResult::success(value),
            Err(e) => {
                warn!("tool error: {}", e);
                ToolCallResult::error(e.code(), &e.to_string())
            }
        };
        serde_json::to_value(tool_result).map_err(|e| JsonRpcError::internal_error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_initialize_request() {
        let raw = r#"{"jsonrpc":"2.0","method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"claude-code","version":"1.0"}},"id":1}"#;
        let req: JsonRpcRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(req.method, "initialize");
        let params: InitializeParams = serde_json::from_value(req.params.unwrap()).unwrap();
        assert_eq!(params.protocol_version, "2024-11-05");
        assert_eq!(params.client_info.unwrap().name, "claude-code");
    }

    #[tokio::test]
    async fn test_tools_list_requires_initialize() {
        let state = crate::AppState::in_memory(crate::Config::default());
        let server = McpServer::new(state);
        assert!(server.handle_tools_list().is_err());
    }

    #[tokio::test]
    async fn test_initialize_then_list() {
        let state = crate::AppState::in_memory(crate::Config::default());
        let mut server = McpServer::new(state);
        server.handle_initialize(&None).unwrap();
        let value = server.handle_tools_list().unwrap();
        let tools = value.get("tools").unwrap().as_array().unwrap();
        assert!(!tools.is_empty());
    }
}
