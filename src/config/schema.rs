//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the transport layer.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Root configuration for the transport layer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Which transports to start.
    pub transport: TransportConfig,

    /// Network listener settings.
    pub network: NetworkConfig,

    /// Cross-origin access policy.
    pub cors: CorsConfig,

    /// Credential file locations (existence is reported by `/health`).
    pub credentials: CredentialsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Transport selection.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TransportConfig {
    pub mode: TransportMode,
}

/// Which transports the supervisor starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportMode {
    /// Standard input/output only.
    #[default]
    #[serde(alias = "stdio")]
    PointToPoint,
    /// HTTP listener only.
    #[serde(alias = "http")]
    Network,
    /// Both transports against the same dispatch core.
    Both,
}

impl TransportMode {
    pub fn wants_network(&self) -> bool {
        matches!(self, TransportMode::Network | TransportMode::Both)
    }

    pub fn wants_point_to_point(&self) -> bool {
        matches!(self, TransportMode::PointToPoint | TransportMode::Both)
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportMode::PointToPoint => write!(f, "point-to-point"),
            TransportMode::Network => write!(f, "network"),
            TransportMode::Both => write!(f, "both"),
        }
    }
}

impl FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "point-to-point" | "stdio" => Ok(TransportMode::PointToPoint),
            "network" | "http" => Ok(TransportMode::Network),
            "both" => Ok(TransportMode::Both),
            other => Err(format!(
                "unknown transport mode '{}' (expected point-to-point, network or both)",
                other
            )),
        }
    }
}

/// Network listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Listening port. Required when the network transport is enabled; 0 means ephemeral.
    pub port: Option<u16>,

    /// Literal IP to pin the listener to. Empty or a wildcard lets the planner decide.
    pub bind_address: String,

    /// Consider IPv6 at all.
    pub enable_ipv6: bool,

    /// Prefer an IPv6-only listener when IPv6 is available.
    pub prefer_ipv6: bool,

    /// Try a single IPv6 socket that also accepts IPv4-mapped connections.
    pub dual_stack: bool,

    /// Timeout for each stack probe bind, in milliseconds.
    pub probe_timeout_ms: u64,

    /// Timeout for each bind candidate, in milliseconds.
    pub bind_timeout_ms: u64,

    /// Maximum accepted request body in bytes.
    pub max_body_size: usize,

    /// Total request timeout in seconds.
    pub request_timeout_secs: u64,

    /// How long shutdown waits for in-flight requests, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: None,
            bind_address: String::new(),
            enable_ipv6: true,
            prefer_ipv6: false,
            dual_stack: true,
            probe_timeout_ms: 1_000,
            bind_timeout_ms: 5_000,
            max_body_size: 4 * 1024 * 1024, // 4MB
            request_timeout_secs: 120,
            shutdown_grace_secs: 10,
        }
    }
}

impl NetworkConfig {
    /// Derive the immutable per-run network preferences.
    pub fn preferences(&self) -> NetworkPreferences {
        NetworkPreferences {
            prefer_ipv6: self.prefer_ipv6,
            dual_stack: self.dual_stack,
            enable_ipv6: self.enable_ipv6,
            bind_address: self.bind_address.clone(),
            port: self.port.unwrap_or(0),
        }
    }

    /// The pinned bind address, if the operator configured a specific one.
    pub fn pinned_address(&self) -> Option<IpAddr> {
        self.preferences().pinned_address()
    }
}

/// Network preferences, derived once from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPreferences {
    pub prefer_ipv6: bool,
    pub dual_stack: bool,
    pub enable_ipv6: bool,
    pub bind_address: String,
    pub port: u16,
}

impl NetworkPreferences {
    /// A literal, non-wildcard IP in `bind_address`.
    pub fn pinned_address(&self) -> Option<IpAddr> {
        let trimmed = self.bind_address.trim();
        if trimmed.is_empty() {
            return None;
        }
        trimmed
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .ok()
            .filter(|ip| !ip.is_unspecified())
    }

    /// Whether the operator asked for IPv6 in any form.
    pub fn wants_ipv6(&self) -> bool {
        self.enable_ipv6 && (self.prefer_ipv6 || self.dual_stack)
    }
}

/// Cross-origin access policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Exact origins or `*` wildcard patterns.
    pub allowed_origins: Vec<String>,

    /// Allow RFC 1918, loopback and IPv6 unique-local origins.
    pub allow_private_network_access: bool,

    /// Allow the hosting platform's internal hostnames.
    pub allow_platform_internal_access: bool,

    pub allowed_methods: Vec<String>,

    pub allowed_headers: Vec<String>,

    pub allow_credentials: bool,

    /// Preflight cache lifetime in seconds.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allow_private_network_access: true,
            allow_platform_internal_access: false,
            allowed_methods: vec!["GET".into(), "POST".into(), "OPTIONS".into()],
            allowed_headers: vec![
                "Content-Type".into(),
                "Authorization".into(),
                "X-Request-ID".into(),
                "Mcp-Session-Id".into(),
            ],
            allow_credentials: true,
            max_age_secs: 86_400,
        }
    }
}

/// Locations the credential subsystem reads from.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Stored OAuth token file.
    pub credentials_path: String,

    /// OAuth client keys file.
    pub oauth_keys_path: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            credentials_path: "credentials.json".to_string(),
            oauth_keys_path: "gcp-oauth.keys.json".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}' (expected pretty or json)", other)),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level used when `RUST_LOG` is not set.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
