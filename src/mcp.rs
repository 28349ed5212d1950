//! MCP protocol engine.
//!
//! One [`McpServer`] instance backs exactly one transport: the stdio channel
//! or a single HTTP session. It owns its own tool registry (sessions share no
//! mutable tool state), tracks the initialize handshake, and turns inbound
//! JSON-RPC messages into responses. Framing and session routing live in the
//! transport layers; this type only sees parsed messages.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::protocol::{
    is_notification, negotiate_protocol_version, success_response, RpcError, RpcErrorCode,
    RpcRequest, LATEST_PROTOCOL_VERSION,
};
use crate::tools::{
    builtin_registry, RegistryError, ToolContext, ToolOutput, ToolRegistry,
};
use crate::{SERVER_NAME, VERSION};

/// Per-transport protocol state machine.
#[derive(Debug)]
pub struct McpServer {
    registry: ToolRegistry,
    initialized: bool,
    protocol_version: &'static str,
}

impl McpServer {
    /// Create an engine over an already-populated registry.
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            initialized: false,
            protocol_version: LATEST_PROTOCOL_VERSION,
        }
    }

    /// Create an engine exposing the built-in tools.
    pub fn with_builtin_tools() -> Result<Self, RegistryError> {
        Ok(Self::new(builtin_registry()?))
    }

    /// True once the initialize handshake has completed.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    #[cfg(test)]
    pub(crate) fn force_initialized(&mut self) {
        self.initialized = true;
    }

    /// Handle one inbound message. Notifications yield no response; anything
    /// else yields exactly one response value.
    pub async fn handle_message(&mut self, message: Value) -> Option<Value> {
        if is_notification(&message) {
            let method = message
                .get("method")
                .and_then(Value::as_str)
                .unwrap_or_default();
            debug!(method, "notification received");
            return None;
        }

        let request: RpcRequest = match serde_json::from_value(message) {
            Ok(request) => request,
            Err(err) => {
                warn!(%err, "structurally invalid request");
                return Some(
                    RpcError::invalid_request(format!("malformed request: {err}"))
                        .to_response(None),
                );
            }
        };
        Some(self.handle_request(request).await)
    }

    async fn handle_request(&mut self, request: RpcRequest) -> Value {
        if !self.initialized && !matches!(request.method.as_str(), "initialize" | "ping") {
            return RpcError::invalid_request("server not initialized")
                .to_response(Some(request.id));
        }

        let result = match request.method.as_str() {
            "initialize" => self.initialize(&request.params),
            "ping" => Ok(json!({})),
            // Some clients send the initialized notification with an id.
            "notifications/initialized" => Ok(json!({})),
            "tools/list" => self.list_tools(),
            "tools/call" => self.call_tool(request.params).await,
            other => Err(RpcError::method_not_found(other)),
        };

        match result {
            Ok(result) => success_response(&request.id, result),
            Err(error) => error.to_response(Some(request.id)),
        }
    }

    fn initialize(&mut self, params: &Value) -> Result<Value, RpcError> {
        if self.initialized {
            return Err(RpcError::invalid_request("server already initialized"));
        }

        let requested = params.get("protocolVersion").and_then(Value::as_str);
        self.protocol_version = negotiate_protocol_version(requested);
        self.initialized = true;
        debug!(protocol_version = self.protocol_version, "handshake complete");

        Ok(json!({
            "protocolVersion": self.protocol_version,
            "capabilities": { "tools": {} },
            "serverInfo": { "name": SERVER_NAME, "version": VERSION },
        }))
    }

    fn list_tools(&self) -> Result<Value, RpcError> {
        Ok(json!({ "tools": self.registry.list_all() }))
    }

    async fn call_tool(&self, params: Value) -> Result<Value, RpcError> {
        #[derive(Deserialize)]
        struct CallParams {
            name: String,
            #[serde(default)]
            arguments: Value,
        }

        let params: CallParams = serde_json::from_value(params)
            .map_err(|err| RpcError::invalid_params(format!("invalid tools/call params: {err}")))?;
        let tool = self
            .registry
            .resolve(&params.name)
            .map_err(|err| RpcError::invalid_params(err.to_string()))?;

        let arguments = if params.arguments.is_null() {
            json!({})
        } else {
            params.arguments
        };
        tool.input_shape()
            .validate(&arguments)
            .map_err(|err| RpcError::invalid_params(err.to_string()))?;

        let output = match (tool.executor())(ToolContext::new(), arguments).await {
            Ok(output) => output,
            Err(err) => {
                warn!(tool = tool.name(), %err, "tool execution failed");
                ToolOutput::error_text(format!("Error: {err}"))
            }
        };
        serde_json::to_value(output).map_err(|err| {
            RpcError::new(
                RpcErrorCode::InternalError,
                format!("failed to encode tool output: {err}"),
            )
        })
    }
}
