//! JSON-RPC 2.0 message layer for the MCP endpoint.
//!
//! Error codes follow JSON-RPC 2.0 conventions:
//! - -32700 to -32600: Standard JSON-RPC errors
//! - -32099 to -32000: Server errors (transport-level rejections)

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// JSON-RPC protocol version string carried on every message.
pub const JSONRPC_VERSION: &str = "2.0";

/// Latest MCP protocol revision this server speaks.
pub const LATEST_PROTOCOL_VERSION: &str = "2025-03-26";

/// All MCP protocol revisions this server accepts during negotiation.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-03-26", "2024-11-05"];

// ---------------------------------------------------------------------------
// Error codes
// ---------------------------------------------------------------------------

/// JSON-RPC error codes used by this server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum RpcErrorCode {
    /// Invalid JSON was received by the server.
    ParseError = -32700,
    /// The JSON sent is not a valid Request object.
    InvalidRequest = -32600,
    /// The method does not exist / is not available.
    MethodNotFound = -32601,
    /// Invalid method parameter(s).
    InvalidParams = -32602,
    /// Internal JSON-RPC error.
    InternalError = -32603,
    /// Transport-level rejection (bad or missing session).
    BadRequest = -32000,
}

impl RpcErrorCode {
    /// Get the default error message for this code.
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal server error",
            Self::BadRequest => "Bad Request",
        }
    }
}

// ---------------------------------------------------------------------------
// Error object
// ---------------------------------------------------------------------------

/// A JSON-RPC error object, convertible into a full error response.
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
pub struct RpcError {
    /// The JSON-RPC error code.
    pub code: i32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional error data.
    pub data: Option<Value>,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl RpcError {
    /// Create a new `RpcError` from an error code with its default message.
    pub fn from_code(code: RpcErrorCode) -> Self {
        Self {
            code: code as i32,
            message: code.default_message().to_string(),
            data: None,
        }
    }

    /// Create a new `RpcError` with a custom message.
    pub fn new(code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code as i32,
            message: message.into(),
            data: None,
        }
    }

    /// Shorthand for an invalid-params error.
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::InvalidParams, message)
    }

    /// Shorthand for an invalid-request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::InvalidRequest, message)
    }

    /// Shorthand for a method-not-found error.
    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            RpcErrorCode::MethodNotFound,
            format!("Method not found: {method}"),
        )
    }

    /// Convert to the JSON-RPC error object format.
    pub fn to_dict(&self) -> Value {
        let mut error = serde_json::Map::new();
        error.insert("code".to_string(), Value::Number(self.code.into()));
        error.insert("message".to_string(), Value::String(self.message.clone()));
        if let Some(ref data) = self.data {
            error.insert("data".to_string(), data.clone());
        }
        Value::Object(error)
    }

    /// Convert to a full JSON-RPC error response.
    pub fn to_response(&self, request_id: Option<Value>) -> Value {
        json!({
            "jsonrpc": JSONRPC_VERSION,
            "error": self.to_dict(),
            "id": request_id.unwrap_or(Value::Null),
        })
    }
}

// ---------------------------------------------------------------------------
// Request shape and message classification
// ---------------------------------------------------------------------------

/// An inbound JSON-RPC request after minimal structural validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    /// Request id echoed on the response. Null for id-less requests.
    #[serde(default)]
    pub id: Value,
    /// Method name, e.g. `tools/call`.
    pub method: String,
    /// Method parameters; null when omitted.
    #[serde(default)]
    pub params: Value,
}

/// Build a JSON-RPC success response for the given request id.
pub fn success_response(id: &Value, result: Value) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "result": result,
    })
}

/// True when the message is a JSON-RPC notification (no id, so no response
/// may be sent for it).
pub fn is_notification(message: &Value) -> bool {
    message.get("jsonrpc").and_then(Value::as_str) == Some(JSONRPC_VERSION)
        && message.get("method").and_then(Value::as_str).is_some()
        && message.get("id").is_none()
}

/// True when the message declares itself a protocol initialization request.
pub fn is_initialize_request(message: &Value) -> bool {
    message.get("method").and_then(Value::as_str) == Some("initialize")
        && !is_notification(message)
}

/// Pick the protocol revision to answer with: echo the requested revision
/// when supported, otherwise fall back to the latest supported one.
pub fn negotiate_protocol_version(requested: Option<&str>) -> &'static str {
    requested
        .and_then(|v| SUPPORTED_PROTOCOL_VERSIONS.iter().find(|s| **s == v))
        .copied()
        .unwrap_or(LATEST_PROTOCOL_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(RpcErrorCode::ParseError as i32, -32700);
        assert_eq!(RpcErrorCode::InvalidRequest as i32, -32600);
        assert_eq!(RpcErrorCode::MethodNotFound as i32, -32601);
        assert_eq!(RpcErrorCode::InvalidParams as i32, -32602);
        assert_eq!(RpcErrorCode::InternalError as i32, -32603);
        assert_eq!(RpcErrorCode::BadRequest as i32, -32000);
    }

    #[test]
    fn test_error_to_response_shape() {
        let error = RpcError::from_code(RpcErrorCode::InternalError);
        let response = error.to_response(None);

        assert_eq!(response["jsonrpc"], "2.0");
        assert_eq!(response["error"]["code"], -32603);
        assert_eq!(response["error"]["message"], "Internal server error");
        assert_eq!(response["id"], Value::Null);
        assert!(response["error"].get("data").is_none());
    }

    #[test]
    fn test_error_display() {
        let error = RpcError::new(RpcErrorCode::InvalidParams, "bad format");
        assert_eq!(error.to_string(), "[-32602] bad format");
    }

    #[test]
    fn test_success_response_echoes_id() {
        let response = success_response(&json!(7), json!({"ok": true}));
        assert_eq!(response["id"], 7);
        assert_eq!(response["result"]["ok"], true);
        assert_eq!(response["jsonrpc"], "2.0");
    }

    #[test]
    fn test_notification_detection() {
        let notification = json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        });
        assert!(is_notification(&notification));

        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/list"
        });
        assert!(!is_notification(&request));
    }

    #[test]
    fn test_initialize_request_detection() {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 0,
            "method": "initialize",
            "params": {"protocolVersion": "2025-03-26"}
        });
        assert!(is_initialize_request(&request));

        let notification = json!({
            "jsonrpc": "2.0",
            "method": "initialize"
        });
        assert!(!is_initialize_request(&notification));

        let other = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"});
        assert!(!is_initialize_request(&other));
    }

    #[test]
    fn test_request_parsing_defaults() {
        let request: RpcRequest =
            serde_json::from_value(json!({"method": "initialize"})).unwrap();
        assert_eq!(request.id, Value::Null);
        assert_eq!(request.method, "initialize");
        assert_eq!(request.params, Value::Null);
    }

    #[test]
    fn test_version_negotiation() {
        assert_eq!(negotiate_protocol_version(Some("2024-11-05")), "2024-11-05");
        assert_eq!(negotiate_protocol_version(Some("1999-01-01")), "2025-03-26");
        assert_eq!(negotiate_protocol_version(None), "2025-03-26");
    }
}
