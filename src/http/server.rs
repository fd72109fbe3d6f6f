//! Protocol bridge: the HTTP surface over the shared dispatch core.
//!
//! # Responsibilities
//! - Probe the stack, plan and execute the bind cascade
//! - Create the Axum Router with per-route access gates
//! - Wire up middleware (tracing, limits, request ID, timeouts)
//! - Serve until stopped, then drain in-flight requests
//!
//! # States
//! ```text
//! Stopped → Starting → Running → Stopping → Stopped
//!              │
//!              └─ bind failure → Stopped (error returned to caller)
//! ```

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    middleware::{from_fn_with_state, map_response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::NetworkConfig;
use crate::health::HealthAggregator;
use crate::http::handlers::{self, AppState};
use crate::http::middleware::{access_gate_middleware, GateState};
use crate::http::request::UuidRequestId;
use crate::http::response::normalize_layer_errors;
use crate::lifecycle::Shutdown;
use crate::net::{BindError, BindSummary, BindingPlanner, RequestTracker, SocketBinder, StackProber};
use crate::rpc::RpcRouter;
use crate::security::AccessGate;

pub const RPC_PATH: &str = "/mcp";
pub const HEALTH_PATH: &str = "/health";

/// Lifecycle state of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum BridgeState {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

impl BridgeState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => BridgeState::Starting,
            2 => BridgeState::Running,
            3 => BridgeState::Stopping,
            _ => BridgeState::Stopped,
        }
    }
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BridgeState::Stopped => "stopped",
            BridgeState::Starting => "starting",
            BridgeState::Running => "running",
            BridgeState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("bridge is {0}; start requires stopped")]
    InvalidState(BridgeState),

    #[error("bind failed: {0}")]
    Bind(#[from] BindError),

    #[error("server I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("server task failed: {0}")]
    Task(String),
}

struct RunningServer {
    shutdown: Shutdown,
    task: JoinHandle<io::Result<()>>,
}

/// HTTP transport. Owns the listening socket while running.
pub struct ProtocolBridge {
    config: NetworkConfig,
    state: AtomicU8,
    rpc: RpcRouter,
    gate: AccessGate,
    health: Arc<HealthAggregator>,
    tracker: RequestTracker,
    local_addr: ArcSwapOption<SocketAddr>,
    running: Mutex<Option<RunningServer>>,
}

impl fmt::Debug for ProtocolBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolBridge")
            .field("state", &self.state())
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

impl ProtocolBridge {
    pub fn new(
        config: NetworkConfig,
        rpc: RpcRouter,
        gate: AccessGate,
        health: Arc<HealthAggregator>,
        tracker: RequestTracker,
    ) -> Self {
        Self {
            config,
            state: AtomicU8::new(BridgeState::Stopped as u8),
            rpc,
            gate,
            health,
            tracker,
            local_addr: ArcSwapOption::empty(),
            running: Mutex::new(None),
        }
    }

    pub fn state(&self) -> BridgeState {
        BridgeState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: BridgeState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Address actually bound, while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.load().as_deref().copied()
    }

    pub fn health(&self) -> &Arc<HealthAggregator> {
        &self.health
    }

    /// Probe, plan, bind and start serving. No retries; a failed bind
    /// returns the bridge to `Stopped`.
    pub async fn start(&self) -> Result<BindSummary, BridgeError> {
        if let Err(current) = self.state.compare_exchange(
            BridgeState::Stopped as u8,
            BridgeState::Starting as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            return Err(BridgeError::InvalidState(BridgeState::from_u8(current)));
        }

        let prefs = self.config.preferences();
        let prober = StackProber::new(Duration::from_millis(self.config.probe_timeout_ms));
        let stack = prober.probe().await;
        self.health.record_stack(stack);

        let candidates = BindingPlanner::plan(&prefs, &stack);
        tracing::info!(
            port = prefs.port,
            ipv4 = stack.ipv4,
            ipv6 = stack.ipv6,
            candidates = candidates.len(),
            "Bind plan ready"
        );

        let binder = SocketBinder::new(Duration::from_millis(self.config.bind_timeout_ms));
        let mut outcome = binder.bind(&candidates, prefs.port).await;
        let summary = outcome.summary();
        self.health.record_bind(summary.clone());

        let listener = match outcome.take_listener() {
            Some(listener) if outcome.success => listener,
            _ => {
                self.set_state(BridgeState::Stopped);
                let error = outcome.error.unwrap_or(BindError::NoCandidates);
                return Err(BridgeError::Bind(error));
            }
        };

        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                self.set_state(BridgeState::Stopped);
                self.health.clear_bind();
                return Err(BridgeError::Io(e));
            }
        };
        self.local_addr.store(Some(Arc::new(addr)));

        let app = build_router(
            AppState {
                rpc: self.rpc.clone(),
                health: Arc::clone(&self.health),
            },
            self.gate.clone(),
            self.tracker.clone(),
            &self.config,
        );

        let shutdown = Shutdown::new();
        let signal = shutdown.clone();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.wait().await })
                .await
        });

        *self.running.lock().await = Some(RunningServer { shutdown, task });
        self.set_state(BridgeState::Running);
        tracing::info!(address = %addr, "HTTP bridge running");
        Ok(summary)
    }

    /// Stop accepting, drain in-flight requests, release the socket.
    /// Stopping a bridge that is not running is a no-op.
    pub async fn stop(&self) -> Result<(), BridgeError> {
        if self
            .state
            .compare_exchange(
                BridgeState::Running as u8,
                BridgeState::Stopping as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return Ok(());
        }

        let grace = Duration::from_secs(self.config.shutdown_grace_secs);
        let running = self.running.lock().await.take();
        let result = match running {
            Some(RunningServer { shutdown, mut task }) => {
                tracing::info!(
                    inflight = self.tracker.active_count(),
                    "HTTP bridge stopping"
                );
                shutdown.trigger();

                if !self.tracker.wait_for_idle(grace).await {
                    tracing::warn!(
                        inflight = self.tracker.active_count(),
                        "Drain deadline passed with requests in flight"
                    );
                }

                match tokio::time::timeout(grace, &mut task).await {
                    Ok(Ok(Ok(()))) => Ok(()),
                    Ok(Ok(Err(e))) => Err(BridgeError::Io(e)),
                    Ok(Err(e)) => Err(BridgeError::Task(e.to_string())),
                    Err(_) => {
                        task.abort();
                        Err(BridgeError::Task("server did not stop within the grace period".into()))
                    }
                }
            }
            None => Ok(()),
        };

        self.local_addr.store(None);
        self.health.clear_bind();
        self.set_state(BridgeState::Stopped);
        tracing::info!("HTTP bridge stopped");
        result
    }
}

/// Build the Axum router with all middleware layers.
///
/// `/mcp` is security-sensitive: a failed origin check rejects the request.
/// `/health` degrades gracefully and is served with permissive headers.
#[allow(deprecated)]
pub fn build_router(
    state: AppState,
    gate: AccessGate,
    tracker: RequestTracker,
    config: &NetworkConfig,
) -> Router {
    let rpc_gate = GateState::sensitive(gate.clone(), RPC_PATH);
    let health_gate = GateState::open(gate, HEALTH_PATH);

    Router::new()
        .route(
            RPC_PATH,
            post(handlers::rpc_handler)
                .fallback(handlers::method_not_allowed)
                .layer(from_fn_with_state(rpc_gate, access_gate_middleware)),
        )
        .route(
            HEALTH_PATH,
            get(handlers::health_handler)
                .post(handlers::health_handler)
                .fallback(handlers::method_not_allowed)
                .layer(from_fn_with_state(health_gate, access_gate_middleware)),
        )
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(from_fn_with_state(tracker, handlers::track_requests))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_body_size))
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(map_response(normalize_layer_errors))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CorsConfig;
    use crate::dispatch::{FileCredentials, ToolDefinition, ToolRegistry};
    use crate::rpc::ServerInfo;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn parts() -> (AppState, AccessGate, RequestTracker) {
        let registry = ToolRegistry::new().register(
            ToolDefinition::new("echo", "Echo"),
            |args: Value| async move { Ok::<Value, crate::dispatch::DispatchError>(args) },
        );
        let core = Arc::new(registry);
        let gate = AccessGate::from_config(&CorsConfig::default());
        let tracker = RequestTracker::new();
        let health = Arc::new(HealthAggregator::new(
            NetworkConfig::default().preferences(),
            core.clone(),
            Arc::new(FileCredentials::new("/nonexistent/c.json", "/nonexistent/k.json")),
            Arc::clone(gate.store()),
            tracker.clone(),
        ));
        let state = AppState {
            rpc: RpcRouter::new(core, ServerInfo::default()),
            health,
        };
        (state, gate, tracker)
    }

    fn app() -> Router {
        let (state, gate, tracker) = parts();
        build_router(state, gate, tracker, &NetworkConfig::default())
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn rpc(body: &str) -> Request<Body> {
        Request::post(RPC_PATH)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn rpc_tools_list() {
        let response = app().oneshot(rpc(r#"{"method":"tools/list"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        let body = body_json(response).await;
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["id"], Value::Null);
        assert_eq!(body["result"]["tools"][0]["name"], "echo");
    }

    #[tokio::test]
    async fn rpc_unknown_method() {
        let response = app().oneshot(rpc(r#"{"method":"bogus","id":9}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], -32601);
        assert_eq!(body["id"], 9);
    }

    #[tokio::test]
    async fn rpc_bad_envelopes_are_400() {
        let response = app().oneshot(rpc("{nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], -32700);

        let response = app().oneshot(rpc(r#"{"id":1}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn wrong_verbs_and_paths() {
        let get_rpc = Request::get(RPC_PATH).body(Body::empty()).unwrap();
        let response = app().oneshot(get_rpc).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let put_health = Request::put(HEALTH_PATH).body(Body::empty()).unwrap();
        let response = app().oneshot(put_health).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let missing = Request::get("/nowhere").body(Body::empty()).unwrap();
        let response = app().oneshot(missing).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "Not Found");
    }

    #[tokio::test]
    async fn health_without_listener_is_503() {
        let response = app()
            .oneshot(Request::get(HEALTH_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["status"], "unhealthy");
        assert_eq!(body["checks"]["listener"]["status"], "unhealthy");
    }

    #[tokio::test]
    async fn rpc_rejects_foreign_origin_but_health_does_not() {
        let request = Request::post(RPC_PATH)
            .header(header::ORIGIN, "https://evil.example.com")
            .body(Body::from(r#"{"method":"ping"}"#))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(body["isPrivateNetwork"], false);

        let request = Request::get(HEALTH_PATH)
            .header(header::ORIGIN, "https://evil.example.com")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn preflight_verdicts() {
        let preflight = |origin: &str| {
            Request::options(RPC_PATH)
                .header(header::ORIGIN, origin)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap()
        };

        let response = app().oneshot(preflight("http://192.168.1.50:4000")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://192.168.1.50:4000"
        );

        let response = app().oneshot(preflight("https://evil.example.com")).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(body["origin"], "https://evil.example.com");
        assert_eq!(body["isPrivateNetwork"], false);
        assert_eq!(body["error"], "CORS policy violation");
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let (state, gate, tracker) = parts();
        let mut config = NetworkConfig::default();
        config.max_body_size = 16;
        let app = build_router(state, gate, tracker, &config);
        let response = app
            .oneshot(rpc(&json!({"method": "ping", "params": {"pad": "x".repeat(64)}}).to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(response.headers().contains_key("x-request-id"));
        let body = body_json(response).await;
        assert_eq!(body["error"], "Payload Too Large");
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn slow_request_times_out_with_json_body() {
        let registry = ToolRegistry::new().register(
            ToolDefinition::new("sleep", "Sleep"),
            |_args: Value| async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<Value, crate::dispatch::DispatchError>(Value::Null)
            },
        );
        let (mut state, gate, tracker) = parts();
        state.rpc = RpcRouter::new(Arc::new(registry), ServerInfo::default());
        let mut config = NetworkConfig::default();
        config.request_timeout_secs = 1;
        let app = build_router(state, gate, tracker, &config);

        let response = app
            .oneshot(rpc(r#"{"method":"tools/call","params":{"name":"sleep","arguments":{}},"id":1}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Request Timeout");
    }

    #[tokio::test]
    async fn wrong_verb_from_allowed_origin_is_405() {
        let (state, gate, tracker) = parts();
        gate.store().replace(crate::security::AccessPolicy::from_config(&CorsConfig {
            allowed_origins: vec!["https://app.example.com".into()],
            ..CorsConfig::default()
        }));
        let app = build_router(state, gate, tracker, &NetworkConfig::default());

        let request = Request::delete(RPC_PATH)
            .header(header::ORIGIN, "https://app.example.com")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body_json(response).await["error"], "Method Not Allowed");
    }

    #[tokio::test]
    async fn non_origin_url_is_rejected_on_rpc() {
        let (state, gate, tracker) = parts();
        gate.store().replace(crate::security::AccessPolicy::from_config(&CorsConfig {
            allowed_origins: vec!["https://*.example.com".into()],
            ..CorsConfig::default()
        }));
        let app = build_router(state, gate, tracker, &NetworkConfig::default());

        let request = Request::post(RPC_PATH)
            .header(header::ORIGIN, "https://attacker.net/x.example.com")
            .body(Body::from(r#"{"method":"ping"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn start_and_stop_on_loopback() {
        let (state, gate, tracker) = parts();
        let mut config = NetworkConfig::default();
        config.port = Some(0);
        config.bind_address = "127.0.0.1".into();
        let bridge = ProtocolBridge::new(config, state.rpc, gate, state.health, tracker);

        let summary = bridge.start().await.unwrap();
        assert!(summary.success);
        assert_eq!(bridge.state(), BridgeState::Running);
        assert!(bridge.local_addr().unwrap().port() > 0);
        assert!(matches!(bridge.start().await, Err(BridgeError::InvalidState(BridgeState::Running))));

        bridge.stop().await.unwrap();
        assert_eq!(bridge.state(), BridgeState::Stopped);
        assert!(bridge.local_addr().is_none());
        bridge.stop().await.unwrap();
    }

    #[tokio::test]
    async fn failed_bind_returns_to_stopped() {
        let (state, gate, tracker) = parts();
        let mut config = NetworkConfig::default();
        config.port = Some(0);
        config.bind_address = "192.0.2.1".into();
        let bridge = ProtocolBridge::new(config, state.rpc, gate, state.health.clone(), tracker);

        assert!(matches!(bridge.start().await, Err(BridgeError::Bind(_))));
        assert_eq!(bridge.state(), BridgeState::Stopped);
        assert!(!state.health.bind_summary().unwrap().success);
    }
}
