//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use mcp_transport::config::{AppConfig, CorsConfig};
use mcp_transport::dispatch::{CredentialStatus, DispatchCore, DispatchError};
use mcp_transport::health::HealthAggregator;
use mcp_transport::net::RequestTracker;
use mcp_transport::rpc::{RpcRouter, ServerInfo};
use mcp_transport::security::AccessGate;
use mcp_transport::ProtocolBridge;

/// Dispatch core that answers `tools/list` with an empty list and fails
/// `tools/call` on demand.
#[derive(Debug, Default)]
pub struct MockCore {
    pub fail_calls: AtomicBool,
}

#[async_trait]
impl DispatchCore for MockCore {
    fn recognizes(&self, method: &str) -> bool {
        matches!(method, "tools/list" | "tools/call")
    }

    async fn handle(&self, method: &str, params: Option<Value>) -> Result<Value, DispatchError> {
        match method {
            "tools/list" => Ok(json!({ "tools": [] })),
            _ if self.fail_calls.load(Ordering::SeqCst) => {
                Err(DispatchError::Internal("upstream unavailable".into()))
            }
            _ => Ok(json!({ "echo": params })),
        }
    }
}

#[derive(Debug)]
pub struct StaticCredentials(pub bool);

impl CredentialStatus for StaticCredentials {
    fn credentials_file_present(&self) -> bool {
        self.0
    }

    fn oauth_keys_present(&self) -> bool {
        self.0
    }
}

pub struct TestBridge {
    pub bridge: ProtocolBridge,
    pub core: Arc<MockCore>,
    pub addr: SocketAddr,
}

impl TestBridge {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Config that pins the listener to loopback on an ephemeral port.
pub fn loopback_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.network.port = Some(0);
    config.network.bind_address = "127.0.0.1".into();
    config.network.shutdown_grace_secs = 2;
    config
}

/// Start a bridge on 127.0.0.1:0 with the mock core.
pub async fn start_bridge(cors: CorsConfig, credentials_present: bool) -> TestBridge {
    let config = loopback_config();
    let core = Arc::new(MockCore::default());
    let gate = AccessGate::from_config(&cors);
    let tracker = RequestTracker::new();
    let health = Arc::new(HealthAggregator::new(
        config.network.preferences(),
        core.clone(),
        Arc::new(StaticCredentials(credentials_present)),
        Arc::clone(gate.store()),
        tracker.clone(),
    ));
    let rpc = RpcRouter::new(core.clone(), ServerInfo::default());

    let bridge = ProtocolBridge::new(config.network, rpc, gate, health, tracker);
    bridge.start().await.unwrap();
    let addr = bridge.local_addr().unwrap();
    TestBridge { bridge, core, addr }
}
