/// MCP (Model Context Protocol) message structures and JSON-RPC handling
///
/// This module defines the JSON-RPC messages the harness writes to a server
/// under test and the parsed form of the lines it reads back.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// MCP protocol version the harness announces by default
pub const MCP_VERSION: &str = "2024-11-05";

/// JSON-RPC version string carried by every message
pub const JSONRPC_VERSION: &str = "2.0";

/// Identifier correlating a request with its response
///
/// JSON-RPC allows both numbers and strings. The harness only ever sends
/// numbers, but servers are free to echo whatever they like, so both forms
/// are parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

/// JSON-RPC 2.0 request message
///
/// Immutable once built; the harness hands out a fresh id for every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Unique identifier for this request
    pub id: RequestId,
    /// The method to call (e.g., "tools/list")
    pub method: String,
    /// Parameters for the method call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 notification (a request without an id, never answered)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 response message as read from a server
///
/// `result` and `error` are kept exactly as present on the wire: a
/// `"result": null` member is `Some(Value::Null)`, an absent member is
/// `None`. Whether the pair is legal is decided by [`JsonRpcResponse::body`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcResponse {
    /// Echoed request id, `None` when the server sent `null`
    pub id: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

/// JSON-RPC error information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code (standard JSON-RPC codes are negative)
    pub code: i64,
    /// Human-readable error message
    pub message: String,
    /// Additional error details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// The legal payload of a response: exactly one of `result` or `error`
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody<'a> {
    Result(&'a Value),
    Error(JsonRpcError),
}

/// A well-formed JSON-RPC message that breaks a protocol rule
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("response carries both `result` and `error`")]
    BothResultAndError,

    #[error("response carries neither `result` nor `error`")]
    NeitherResultNorError,

    #[error("malformed `error` object: {0}")]
    MalformedError(String),
}

impl JsonRpcResponse {
    /// Resolve the response payload, rejecting both/neither `result`/`error`
    pub fn body(&self) -> Result<ResponseBody<'_>, ProtocolViolation> {
        match (&self.result, &self.error) {
            (Some(_), Some(_)) => Err(ProtocolViolation::BothResultAndError),
            (None, None) => Err(ProtocolViolation::NeitherResultNorError),
            (Some(result), None) => Ok(ResponseBody::Result(result)),
            (None, Some(error)) => {
                let parsed: JsonRpcError = serde_json::from_value(error.clone())
                    .map_err(|e| ProtocolViolation::MalformedError(e.to_string()))?;
                if parsed.message.trim().is_empty() {
                    return Err(ProtocolViolation::MalformedError(
                        "`message` is empty".to_string(),
                    ));
                }
                Ok(ResponseBody::Error(parsed))
            }
        }
    }
}

/// One parsed line from the server's stdout
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingMessage {
    /// Anything carrying an `id` and no `method`
    Response(JsonRpcResponse),
    /// Server-initiated notification (`method`, no `id`)
    Notification { method: String },
    /// Server-initiated request (`method` and `id`); the harness never answers these
    ServerRequest { id: Option<RequestId>, method: String },
}

/// Parse one line of server output as a JSON-RPC message
///
/// The error string names what made the line unusable; callers wrap it in a
/// transport error together with the raw line.
pub fn parse_incoming(line: &str) -> Result<IncomingMessage, String> {
    let value: Value =
        serde_json::from_str(line).map_err(|e| format!("invalid JSON: {}", e))?;
    let Value::Object(mut object) = value else {
        return Err("expected a JSON object".to_string());
    };

    if let Some(method) = object.get("method") {
        let method = method
            .as_str()
            .ok_or_else(|| "`method` is not a string".to_string())?
            .to_string();
        return match object.get("id") {
            None => Ok(IncomingMessage::Notification { method }),
            Some(id) => Ok(IncomingMessage::ServerRequest {
                id: parse_id(id)?,
                method,
            }),
        };
    }

    let id = match object.get("id") {
        Some(id) => parse_id(id)?,
        None => return Err("response has no `id`".to_string()),
    };
    check_version(&object)?;

    Ok(IncomingMessage::Response(JsonRpcResponse {
        id,
        result: object.remove("result"),
        error: object.remove("error"),
    }))
}

fn parse_id(id: &Value) -> Result<Option<RequestId>, String> {
    match id {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .map(|n| Some(RequestId::Number(n)))
            .ok_or_else(|| format!("`id` {} is not an integer", n)),
        Value::String(s) => Ok(Some(RequestId::String(s.clone()))),
        other => Err(format!("`id` has unsupported type: {}", other)),
    }
}

fn check_version(object: &Map<String, Value>) -> Result<(), String> {
    match object.get("jsonrpc") {
        Some(Value::String(v)) if v == JSONRPC_VERSION => Ok(()),
        Some(other) => Err(format!("`jsonrpc` must be \"2.0\", got {}", other)),
        None => Err("missing `jsonrpc` member".to_string()),
    }
}

// JSON-RPC error codes the harness checks for
pub mod error_codes {
    /// Method not found - The requested method doesn't exist
    pub const METHOD_NOT_FOUND: i64 = -32601;
}

/// Information about the MCP client (this harness)
#[derive(Debug, Clone, Serialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: "mcp-forge-tester".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// MCP initialization request parameters
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// MCP protocol version the client speaks
    pub protocol_version: String,
    /// Capabilities the client supports (the harness declares none)
    pub capabilities: Value,
    pub client_info: ClientInfo,
}

/// MCP tool call parameters
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallParams {
    /// Name of the tool to call
    pub name: String,
    /// Arguments to pass to the tool
    pub arguments: Map<String, Value>,
}
