//! Access gate middleware.
//! Answers preflights and enforces the origin policy per route.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::warn;

use crate::http::request::request_id;
use crate::observability::metrics;
use crate::security::access_control::rejection_body;
use crate::security::headers::{self, requests_private_network};
use crate::security::AccessGate;

/// How a route treats a failed origin check on a real (non-preflight) request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensitivity {
    /// Serve the request with permissive headers and log the failure.
    Open,
    /// Reject with 403.
    Sensitive,
}

/// Per-route middleware state.
#[derive(Debug, Clone)]
pub struct GateState {
    gate: AccessGate,
    sensitivity: Sensitivity,
    route: &'static str,
}

impl GateState {
    pub fn open(gate: AccessGate, route: &'static str) -> Self {
        Self {
            gate,
            sensitivity: Sensitivity::Open,
            route,
        }
    }

    pub fn sensitive(gate: AccessGate, route: &'static str) -> Self {
        Self {
            gate,
            sensitivity: Sensitivity::Sensitive,
            route,
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

pub async fn access_gate_middleware(
    State(state): State<GateState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let origin = header_str(req.headers(), &header::ORIGIN).map(str::to_owned);

    // 1. Preflight is always answered here.
    if req.method() == Method::OPTIONS {
        let requested_method = header_str(req.headers(), &header::ACCESS_CONTROL_REQUEST_METHOD);
        let private_network = requests_private_network(req.headers());
        let response =
            state
                .gate
                .handle_preflight(origin.as_deref(), requested_method, private_network);

        if response.status == StatusCode::FORBIDDEN {
            metrics::record_origin_rejected(state.route);
            warn!(
                request_id = %request_id(req.headers()),
                route = state.route,
                origin = origin.as_deref().unwrap_or("<none>"),
                "Preflight rejected"
            );
        }
        return response.into_response();
    }

    // 2. Same-origin and non-browser callers carry no Origin.
    let Some(origin) = origin else {
        return next.run(req).await;
    };

    let verdict = state.gate.evaluate(Some(&origin), req.method());
    if verdict.allowed {
        let policy = state.gate.policy();
        let mut response = next.run(req).await;
        headers::apply_allowed(response.headers_mut(), &origin, &policy);
        return response;
    }

    metrics::record_origin_rejected(state.route);
    let reason = verdict.reason.unwrap_or_default();

    match state.sensitivity {
        Sensitivity::Sensitive => {
            warn!(
                request_id = %request_id(req.headers()),
                route = state.route,
                origin = %origin,
                reason = %reason,
                sensitive = true,
                "Origin rejected"
            );
            let policy = state.gate.policy();
            (
                StatusCode::FORBIDDEN,
                Json(rejection_body(Some(&origin), &policy, &reason)),
            )
                .into_response()
        }
        Sensitivity::Open => {
            warn!(
                request_id = %request_id(req.headers()),
                route = state.route,
                origin = %origin,
                reason = %reason,
                sensitive = false,
                "Origin failed validation; serving with permissive headers"
            );
            let mut response = next.run(req).await;
            headers::apply_permissive(response.headers_mut());
            response
        }
    }
}
