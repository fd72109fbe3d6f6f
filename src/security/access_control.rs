//! Origin-based access control.
//!
//! # Responsibilities
//! - Hold the current `AccessPolicy` behind an atomic reference
//! - Decide allow/deny for a declared origin (OR across all patterns)
//! - Answer CORS preflight requests
//!
//! # Design Decisions
//! - Policies are replaced whole, never patched; readers see old or new, never a mix
//! - No precedence and no deny list: the first admitting pattern wins
//! - A rejected origin always yields a well-formed 403, never an error

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    http::{HeaderMap, HeaderName, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::CorsConfig;
use crate::security::headers;
use crate::security::origin::{is_private_network, OriginPattern};

/// Number of patterns echoed back in a rejection body.
const REJECTION_PATTERN_SAMPLE: usize = 5;

/// The complete, immutable access policy.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    /// Unique patterns in insertion order.
    pub patterns: Vec<OriginPattern>,
    pub allowed_methods: Vec<Method>,
    pub allowed_headers: Vec<HeaderName>,
    pub allow_credentials: bool,
    pub max_age: Duration,
}

impl AccessPolicy {
    /// Build a policy from configuration.
    pub fn from_config(config: &CorsConfig) -> Self {
        let mut patterns: Vec<OriginPattern> = Vec::new();
        let mut push = |pattern: OriginPattern| {
            if !patterns.contains(&pattern) {
                patterns.push(pattern);
            }
        };

        for pattern in config.allowed_origins.iter().filter(|p| !p.trim().is_empty()) {
            push(OriginPattern::compile(pattern));
        }
        if config.allow_private_network_access {
            push(OriginPattern::PrivateNetwork);
        }
        if config.allow_platform_internal_access {
            for pattern in OriginPattern::platform_internal() {
                push(pattern);
            }
        }

        let allowed_methods = config
            .allowed_methods
            .iter()
            .filter_map(|m| m.trim().to_ascii_uppercase().parse::<Method>().ok())
            .collect();
        let allowed_headers = config
            .allowed_headers
            .iter()
            .filter_map(|h| h.trim().parse::<HeaderName>().ok())
            .collect();

        Self {
            patterns,
            allowed_methods,
            allowed_headers,
            allow_credentials: config.allow_credentials,
            max_age: Duration::from_secs(config.max_age_secs),
        }
    }

    /// The pattern admitting `origin`, if any.
    pub fn matching_pattern(&self, origin: &str) -> Option<&OriginPattern> {
        self.patterns.iter().find(|p| p.admits(origin))
    }

    pub fn allows_private_network(&self) -> bool {
        self.patterns.contains(&OriginPattern::PrivateNetwork)
    }

    pub fn allows_method(&self, method: &Method) -> bool {
        self.allowed_methods.contains(method)
    }

    /// Observability snapshot.
    pub fn summary(&self) -> PolicySummary {
        PolicySummary {
            pattern_count: self.patterns.len(),
            patterns: self.patterns.iter().map(|p| p.to_string()).collect(),
            private_network_access: self.allows_private_network(),
            allowed_methods: self.allowed_methods.iter().map(|m| m.to_string()).collect(),
            allow_credentials: self.allow_credentials,
            max_age_secs: self.max_age.as_secs(),
        }
    }
}

/// Serializable view of an `AccessPolicy`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PolicySummary {
    pub pattern_count: usize,
    pub patterns: Vec<String>,
    pub private_network_access: bool,
    pub allowed_methods: Vec<String>,
    pub allow_credentials: bool,
    pub max_age_secs: u64,
}

/// Result of validating one request's origin.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OriginVerdict {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl OriginVerdict {
    fn allow(origin: Option<&str>, reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            origin: origin.map(str::to_string),
            reason: Some(reason.into()),
        }
    }

    fn deny(origin: Option<&str>, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            origin: origin.map(str::to_string),
            reason: Some(reason.into()),
        }
    }
}

/// Response to an `OPTIONS` preflight.
#[derive(Debug)]
pub struct PreflightResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl IntoResponse for PreflightResponse {
    fn into_response(self) -> Response {
        let mut response = match self.body {
            Some(body) => (self.status, Json(body)).into_response(),
            None => self.status.into_response(),
        };
        response.headers_mut().extend(self.headers);
        response
    }
}

/// Atomically replaceable access policy.
#[derive(Debug)]
pub struct PolicyStore {
    current: ArcSwap<AccessPolicy>,
}

impl PolicyStore {
    pub fn new(policy: AccessPolicy) -> Self {
        Self {
            current: ArcSwap::from_pointee(policy),
        }
    }

    /// Current policy snapshot. Holding it never blocks a swap.
    pub fn load(&self) -> Arc<AccessPolicy> {
        self.current.load_full()
    }

    /// Replace the policy as a single unit.
    pub fn replace(&self, policy: AccessPolicy) {
        tracing::info!(
            patterns = policy.patterns.len(),
            private_network = policy.allows_private_network(),
            "Access policy replaced"
        );
        self.current.store(Arc::new(policy));
    }
}

/// Per-request access decisions built on the current policy.
#[derive(Debug, Clone)]
pub struct AccessGate {
    store: Arc<PolicyStore>,
}

impl AccessGate {
    pub fn new(store: Arc<PolicyStore>) -> Self {
        Self { store }
    }

    pub fn from_config(config: &CorsConfig) -> Self {
        Self::new(Arc::new(PolicyStore::new(AccessPolicy::from_config(config))))
    }

    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    pub fn policy(&self) -> Arc<AccessPolicy> {
        self.store.load()
    }

    /// Validate a request's declared origin.
    ///
    /// The verdict depends on the origin alone; `method` only labels the
    /// reason. Requests without an `Origin` header are not cross-origin and pass.
    pub fn evaluate(&self, origin: Option<&str>, method: &Method) -> OriginVerdict {
        let policy = self.store.load();
        let mut verdict = evaluate_with(&policy, origin);
        if !verdict.allowed {
            verdict.reason = verdict.reason.map(|r| format!("{} ({} request)", r, method));
        }
        verdict
    }

    /// Answer a preflight request.
    pub fn handle_preflight(
        &self,
        origin: Option<&str>,
        requested_method: Option<&str>,
        private_network: bool,
    ) -> PreflightResponse {
        let policy = self.store.load();
        let Some(origin) = origin else {
            return PreflightResponse {
                status: StatusCode::FORBIDDEN,
                headers: HeaderMap::new(),
                body: Some(rejection_body(None, &policy, "Preflight request without Origin header")),
            };
        };

        let mut verdict = evaluate_with(&policy, Some(origin));
        if verdict.allowed {
            if let Some(requested) = requested_method {
                let permitted = requested
                    .trim()
                    .parse::<Method>()
                    .map(|m| policy.allows_method(&m))
                    .unwrap_or(false);
                if !permitted {
                    verdict = OriginVerdict::deny(
                        Some(origin),
                        format!("Method {} is not allowed", requested.trim()),
                    );
                }
            }
        }

        if verdict.allowed {
            let mut headers = HeaderMap::new();
            headers::apply_allowed(&mut headers, origin, &policy);
            headers::apply_preflight(&mut headers, &policy, private_network);
            PreflightResponse {
                status: StatusCode::OK,
                headers,
                body: None,
            }
        } else {
            let message = verdict
                .reason
                .unwrap_or_else(|| format!("Origin {} is not allowed", origin));
            PreflightResponse {
                status: StatusCode::FORBIDDEN,
                headers: HeaderMap::new(),
                body: Some(rejection_body(Some(origin), &policy, &message)),
            }
        }
    }
}

fn evaluate_with(policy: &AccessPolicy, origin: Option<&str>) -> OriginVerdict {
    let Some(origin) = origin else {
        return OriginVerdict::allow(None, "No Origin header");
    };
    match policy.matching_pattern(origin) {
        Some(pattern) => OriginVerdict::allow(Some(origin), format!("Matched {}", pattern)),
        None => OriginVerdict::deny(Some(origin), format!("Origin {} is not allowed", origin)),
    }
}

/// Diagnostic JSON body for a rejected origin.
pub fn rejection_body(origin: Option<&str>, policy: &AccessPolicy, message: &str) -> Value {
    let sample: Vec<String> = policy
        .patterns
        .iter()
        .take(REJECTION_PATTERN_SAMPLE)
        .map(|p| p.to_string())
        .collect();
    json!({
        "error": "CORS policy violation",
        "message": message,
        "origin": origin,
        "isPrivateNetwork": origin.map(is_private_network).unwrap_or(false),
        "allowedPatterns": sample,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    fn gate(origins: &[&str], private: bool) -> AccessGate {
        AccessGate::from_config(&CorsConfig {
            allowed_origins: origins.iter().map(|s| s.to_string()).collect(),
            allow_private_network_access: private,
            ..CorsConfig::default()
        })
    }

    #[test]
    fn or_semantics_across_patterns() {
        let gate = gate(&["https://app.example.com", "https://*.preview.example.com"], false);

        assert!(gate.evaluate(Some("https://app.example.com"), &Method::POST).allowed);
        assert!(gate.evaluate(Some("https://pr-7.preview.example.com"), &Method::POST).allowed);
        assert!(!gate.evaluate(Some("https://evil.example.com"), &Method::POST).allowed);
        assert!(!gate.evaluate(Some("garbage"), &Method::POST).allowed);
        assert!(!gate.evaluate(Some("http://192.168.1.1"), &Method::POST).allowed);
    }

    #[test]
    fn missing_origin_passes_real_requests() {
        let gate = gate(&[], false);
        let verdict = gate.evaluate(None, &Method::POST);
        assert!(verdict.allowed);
        assert_eq!(verdict.origin, None);
    }

    #[test]
    fn verdict_ignores_request_method() {
        let gate = gate(&["https://app.example.com"], false);
        assert!(gate.evaluate(Some("https://app.example.com"), &Method::DELETE).allowed);

        let denied = gate.evaluate(Some("https://attacker.net/x.example.com"), &Method::POST);
        assert!(!denied.allowed);
    }

    #[test]
    fn preflight_checks_requested_method() {
        let gate = gate(&["https://app.example.com"], false);

        let ok = gate.handle_preflight(Some("https://app.example.com"), Some("POST"), false);
        assert_eq!(ok.status, StatusCode::OK);

        let no_method = gate.handle_preflight(Some("https://app.example.com"), None, false);
        assert_eq!(no_method.status, StatusCode::OK);

        let denied = gate.handle_preflight(Some("https://app.example.com"), Some("DELETE"), false);
        assert_eq!(denied.status, StatusCode::FORBIDDEN);
        assert_eq!(denied.body.unwrap()["message"], "Method DELETE is not allowed");
    }

    #[test]
    fn duplicate_patterns_collapse() {
        let policy = AccessPolicy::from_config(&CorsConfig {
            allowed_origins: vec!["https://a.example".into(), "https://a.example".into(), "private-network".into()],
            allow_private_network_access: true,
            ..CorsConfig::default()
        });
        assert_eq!(policy.patterns.len(), 2);
    }

    #[test]
    fn preflight_private_network_allowed() {
        let gate = gate(&[], true);
        let response = gate.handle_preflight(Some("http://192.168.1.50:4000"), Some("POST"), false);

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(
            response.headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://192.168.1.50:4000"
        );
        assert!(response.body.is_none());
    }

    #[test]
    fn preflight_rejection_body() {
        let gate = gate(&["https://app.example.com"], true);
        let response = gate.handle_preflight(Some("https://evil.example.com"), Some("POST"), false);

        assert_eq!(response.status, StatusCode::FORBIDDEN);
        let body = response.body.unwrap();
        assert_eq!(body["origin"], "https://evil.example.com");
        assert_eq!(body["isPrivateNetwork"], false);
        assert_eq!(body["allowedPatterns"][0], "https://app.example.com");
        assert_eq!(body["allowedPatterns"][1], "private-network");
        assert!(response.headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[test]
    fn preflight_without_origin_is_rejected() {
        let gate = gate(&[], true);
        let response = gate.handle_preflight(None, Some("POST"), false);
        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert_eq!(response.body.unwrap()["origin"], Value::Null);
    }

    #[test]
    fn policy_swap_is_whole() {
        let gate = gate(&["https://old.example"], false);
        let before = gate.policy();

        gate.store().replace(AccessPolicy::from_config(&CorsConfig {
            allowed_origins: vec!["https://new.example".into()],
            allow_private_network_access: false,
            ..CorsConfig::default()
        }));

        // The snapshot taken before the swap is unchanged.
        assert!(before.matching_pattern("https://old.example").is_some());
        assert!(!gate.evaluate(Some("https://old.example"), &Method::GET).allowed);
        assert!(gate.evaluate(Some("https://new.example"), &Method::GET).allowed);
    }
}
