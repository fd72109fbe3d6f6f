//! CORS response header construction.
//!
//! # Responsibilities
//! - Reflect a validated origin back to the caller
//! - Add preflight-only headers (methods, headers, max age)
//! - Answer Private Network Access preflights
//!
//! # Design Decisions
//! - Never reflect an origin that failed validation
//! - `Vary: Origin` on every reflected response so caches stay per-origin

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use crate::security::access_control::AccessPolicy;

pub const ACCESS_CONTROL_REQUEST_PRIVATE_NETWORK: HeaderName =
    HeaderName::from_static("access-control-request-private-network");
pub const ACCESS_CONTROL_ALLOW_PRIVATE_NETWORK: HeaderName =
    HeaderName::from_static("access-control-allow-private-network");

/// Headers for a response to a validated origin.
pub fn apply_allowed(headers: &mut HeaderMap, origin: &str, policy: &AccessPolicy) {
    let Ok(value) = HeaderValue::from_str(origin) else {
        return;
    };
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
    headers.append(header::VARY, HeaderValue::from_static("Origin"));
    if policy.allow_credentials {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
    }
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("x-request-id"),
    );
}

/// Extra headers only sent on a successful preflight.
pub fn apply_preflight(headers: &mut HeaderMap, policy: &AccessPolicy, private_network: bool) {
    if let Ok(value) = HeaderValue::from_str(&join(policy.allowed_methods.iter().map(|m| m.as_str()))) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, value);
    }
    if let Ok(value) = HeaderValue::from_str(&join(policy.allowed_headers.iter().map(|h| h.as_str()))) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, value);
    }
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from(policy.max_age.as_secs()),
    );
    if private_network && policy.allows_private_network() {
        headers.insert(
            ACCESS_CONTROL_ALLOW_PRIVATE_NETWORK,
            HeaderValue::from_static("true"),
        );
    }
}

/// Headers for endpoints that degrade gracefully on a failed validation.
pub fn apply_permissive(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
}

/// True if the preflight asked for private network access.
pub fn requests_private_network(headers: &HeaderMap) -> bool {
    headers
        .get(ACCESS_CONTROL_REQUEST_PRIVATE_NETWORK)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn join<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.collect::<Vec<_>>().join(", ")
}
