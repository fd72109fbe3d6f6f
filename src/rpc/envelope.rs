//! JSON-RPC 2.0 envelope types.
//!
//! Requests are validated once, here, at the parse boundary: a `RpcRequest`
//! always has a method and an id (absent ids are normalized to `null`).
//! Responses are a tagged `result | error` payload, never both.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const JSONRPC_VERSION: &str = "2.0";

// Standard JSON-RPC 2.0 error codes
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// A validated request envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    pub method: String,
    pub params: Option<Value>,
    pub id: Value,
    /// The request carried no `id` member.
    pub is_notification: bool,
}

/// Why a payload could not be turned into a `RpcRequest`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("Parse error: {0}")]
    InvalidJson(String),

    #[error("Invalid Request: {0}")]
    InvalidRequest(&'static str),
}

impl EnvelopeError {
    pub fn code(&self) -> i32 {
        match self {
            EnvelopeError::InvalidJson(_) => PARSE_ERROR,
            EnvelopeError::InvalidRequest(_) => INVALID_REQUEST,
        }
    }

    /// Error response with a null id (the request id is unknown or untrusted).
    pub fn to_response(&self) -> RpcResponse {
        RpcResponse::error(Value::Null, RpcError::new(self.code(), self.to_string()))
    }
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Option<Value>, id: Value) -> Self {
        Self {
            method: method.into(),
            params,
            id,
            is_notification: false,
        }
    }

    /// Parse raw bytes into a request.
    pub fn parse(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| EnvelopeError::InvalidJson(e.to_string()))?;
        Self::from_value(value)
    }

    /// Validate an already-parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, EnvelopeError> {
        let Value::Object(mut object) = value else {
            return Err(EnvelopeError::InvalidRequest("request must be a JSON object"));
        };

        let method = match object.remove("method") {
            Some(Value::String(method)) if !method.is_empty() => method,
            Some(_) => return Err(EnvelopeError::InvalidRequest("method must be a non-empty string")),
            None => return Err(EnvelopeError::InvalidRequest("missing method")),
        };

        let (id, is_notification) = match object.remove("id") {
            Some(id) => (id, false),
            None => (Value::Null, true),
        };

        Ok(Self {
            method,
            params: object.remove("params"),
            id,
            is_notification,
        })
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Either a result or an error, serialized as the matching member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RpcPayload {
    Result(Value),
    Error(RpcError),
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(flatten)]
    pub payload: RpcPayload,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            payload: RpcPayload::Result(result),
        }
    }

    pub fn error(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            payload: RpcPayload::Error(error),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.payload, RpcPayload::Error(_))
    }

    pub fn error_code(&self) -> Option<i32> {
        match &self.payload {
            RpcPayload::Error(e) => Some(e.code),
            RpcPayload::Result(_) => None,
        }
    }
}
