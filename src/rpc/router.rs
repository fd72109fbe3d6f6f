//! Method routing shared by both transports.
//!
//! # Routing
//! ```text
//! initialize                 → answered locally (capability handshake)
//! ping, notifications/initialized → answered locally
//! core.recognizes(method)    → forwarded verbatim, result/error relayed unchanged
//! anything else              → -32601 Method not found
//! forwarding failure/panic   → -32603 Internal error (detail in `data`)
//! ```

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};

use crate::dispatch::{DispatchCore, DispatchError};
use crate::observability::metrics;
use crate::rpc::envelope::{RpcError, RpcRequest, RpcResponse, INTERNAL_ERROR, METHOD_NOT_FOUND};

/// MCP protocol revision announced during `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const METHOD_INITIALIZE: &str = "initialize";
pub const METHOD_PING: &str = "ping";
pub const METHOD_INITIALIZED: &str = "notifications/initialized";

/// Identity announced to clients.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Frames requests onto the dispatch core.
#[derive(Debug, Clone)]
pub struct RpcRouter {
    core: Arc<dyn DispatchCore>,
    info: ServerInfo,
}

impl RpcRouter {
    pub fn new(core: Arc<dyn DispatchCore>, info: ServerInfo) -> Self {
        Self { core, info }
    }

    pub fn core(&self) -> &Arc<dyn DispatchCore> {
        &self.core
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Route one request. Never fails: every outcome is a response.
    pub async fn handle(&self, request: RpcRequest, transport: &'static str) -> RpcResponse {
        let start = Instant::now();
        let RpcRequest { method, params, id, .. } = request;

        let (response, outcome) = match method.as_str() {
            METHOD_INITIALIZE => (RpcResponse::success(id, self.initialize_result()), "local"),
            METHOD_PING | METHOD_INITIALIZED => (RpcResponse::success(id, json!({})), "local"),
            m if self.core.recognizes(m) => {
                let response = self.forward(id, &method, params).await;
                let outcome = if response.is_error() { "error" } else { "ok" };
                (response, outcome)
            }
            _ => {
                tracing::debug!(method = %method, transport, "Unknown RPC method");
                (
                    RpcResponse::error(
                        id,
                        RpcError::new(METHOD_NOT_FOUND, format!("Method not found: {}", method)),
                    ),
                    "not_found",
                )
            }
        };

        metrics::record_rpc(&method, outcome, transport, start);
        response
    }

    fn initialize_result(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": self.info.name,
                "version": self.info.version,
            },
        })
    }

    /// Run the core on its own task so a panic becomes an error response.
    async fn forward(&self, id: Value, method: &str, params: Option<Value>) -> RpcResponse {
        let core = Arc::clone(&self.core);
        let owned_method = method.to_string();
        let task = tokio::spawn(async move { core.handle(&owned_method, params).await });

        match task.await {
            Ok(Ok(result)) => RpcResponse::success(id, result),
            Ok(Err(DispatchError::Rpc { code, message, data })) => {
                RpcResponse::error(id, RpcError { code, message, data })
            }
            Ok(Err(DispatchError::Internal(detail))) => {
                tracing::error!(method = %method, error = %detail, "Dispatch failed");
                internal_error(id, detail)
            }
            Err(e) => {
                tracing::error!(method = %method, error = %e, "Dispatch task aborted");
                internal_error(id, e.to_string())
            }
        }
    }
}

fn internal_error(id: Value, detail: String) -> RpcResponse {
    RpcResponse::error(
        id,
        RpcError::new(INTERNAL_ERROR, "Internal error").with_data(json!({ "detail": detail })),
    )
}
