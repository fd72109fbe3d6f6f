//! Route handlers for the bridge.

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::health::HealthAggregator;
use crate::http::request::request_id;
use crate::http::response;
use crate::net::RequestTracker;
use crate::rpc::{RpcRequest, RpcRouter};

pub const TRANSPORT_LABEL: &str = "http";

/// Application state injected into handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub rpc: RpcRouter,
    pub health: Arc<HealthAggregator>,
}

/// `GET|POST /health`
pub async fn health_handler(State(state): State<AppState>) -> Response {
    let report = state.health.report();
    (report.http_status(), Json(report)).into_response()
}

/// `POST /mcp`
pub async fn rpc_handler(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let request = match RpcRequest::parse(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(
                request_id = %request_id(&headers),
                code = e.code(),
                error = %e,
                "Rejected RPC envelope"
            );
            return (StatusCode::BAD_REQUEST, Json(e.to_response())).into_response();
        }
    };

    tracing::debug!(
        request_id = %request_id(&headers),
        method = %request.method,
        "RPC request"
    );

    let reply = state.rpc.handle(request, TRANSPORT_LABEL).await;
    (StatusCode::OK, Json(reply)).into_response()
}

pub async fn method_not_allowed(request: Request<Body>) -> Response {
    response::method_not_allowed(request.method().as_str(), request.uri().path())
}

pub async fn not_found(request: Request<Body>) -> Response {
    response::not_found(request.uri().path())
}

/// Count in-flight requests for drain and health.
pub async fn track_requests(
    State(tracker): State<RequestTracker>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let _guard = tracker.track();
    next.run(request).await
}
