//! Configuration loading from disk and the environment.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::{AppConfig, LogFormat, TransportMode};
use crate::config::validation::{validate_config, ValidationError};

pub const ENV_CONFIG_FILE: &str = "MCP_CONFIG_FILE";
pub const ENV_TRANSPORT: &str = "MCP_TRANSPORT";
pub const ENV_PORT: &str = "MCP_PORT";
/// Port variable injected by most hosting platforms.
pub const ENV_PLATFORM_PORT: &str = "PORT";
pub const ENV_BIND_ADDRESS: &str = "MCP_BIND_ADDRESS";
pub const ENV_ENABLE_IPV6: &str = "MCP_ENABLE_IPV6";
pub const ENV_PREFER_IPV6: &str = "MCP_PREFER_IPV6";
pub const ENV_DUAL_STACK: &str = "MCP_DUAL_STACK";
pub const ENV_ALLOWED_ORIGINS: &str = "MCP_ALLOWED_ORIGINS";
pub const ENV_ALLOW_PRIVATE_NETWORK: &str = "MCP_ALLOW_PRIVATE_NETWORK";
pub const ENV_ALLOW_PLATFORM_INTERNAL: &str = "MCP_ALLOW_PLATFORM_INTERNAL";
pub const ENV_CREDENTIALS_PATH: &str = "MCP_CREDENTIALS_PATH";
pub const ENV_OAUTH_KEYS_PATH: &str = "MCP_OAUTH_KEYS_PATH";
pub const ENV_LOG_FORMAT: &str = "MCP_LOG_FORMAT";
pub const ENV_METRICS_ADDRESS: &str = "MCP_METRICS_ADDRESS";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value '{value}' for {key}: {reason}")]
    Env {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Values supplied on the command line; they win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub mode: Option<TransportMode>,
    pub port: Option<u16>,
}

/// Environment captured once at startup.
///
/// Reloads reuse the snapshot, so nothing reads the process environment after
/// construction.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment.
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Build a snapshot from explicit pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Non-empty value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Config file path named by the environment, if any.
    pub fn config_file(&self) -> Option<PathBuf> {
        self.get(ENV_CONFIG_FILE).map(PathBuf::from)
    }
}

/// Parse a TOML configuration file without validating it.
pub fn read_config_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Load configuration: defaults, then the optional file, then the environment,
/// then CLI overrides, then validation.
pub fn load(
    path: Option<&Path>,
    env: &EnvSnapshot,
    overrides: &ConfigOverrides,
) -> Result<AppConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config_file(path)?,
        None => AppConfig::default(),
    };

    apply_env(&mut config, env)?;

    if let Some(mode) = overrides.mode {
        config.transport.mode = mode;
    }
    if let Some(port) = overrides.port {
        config.network.port = Some(port);
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply recognized environment variables on top of `config`.
pub fn apply_env(config: &mut AppConfig, env: &EnvSnapshot) -> Result<(), ConfigError> {
    if let Some(value) = env.get(ENV_TRANSPORT) {
        config.transport.mode = value.parse().map_err(|reason| ConfigError::Env {
            key: ENV_TRANSPORT,
            value: value.to_string(),
            reason,
        })?;
    }

    if let Some(port) = parse_port(env, ENV_PORT)? {
        config.network.port = Some(port);
    } else if let Some(port) = parse_port(env, ENV_PLATFORM_PORT)? {
        config.network.port = Some(port);
    }

    if let Some(value) = env.get(ENV_BIND_ADDRESS) {
        config.network.bind_address = value.to_string();
    }
    if let Some(flag) = parse_bool(env, ENV_ENABLE_IPV6)? {
        config.network.enable_ipv6 = flag;
    }
    if let Some(flag) = parse_bool(env, ENV_PREFER_IPV6)? {
        config.network.prefer_ipv6 = flag;
    }
    if let Some(flag) = parse_bool(env, ENV_DUAL_STACK)? {
        config.network.dual_stack = flag;
    }

    if let Some(value) = env.get(ENV_ALLOWED_ORIGINS) {
        config.cors.allowed_origins = split_list(value);
    }
    if let Some(flag) = parse_bool(env, ENV_ALLOW_PRIVATE_NETWORK)? {
        config.cors.allow_private_network_access = flag;
    }
    if let Some(flag) = parse_bool(env, ENV_ALLOW_PLATFORM_INTERNAL)? {
        config.cors.allow_platform_internal_access = flag;
    }

    if let Some(value) = env.get(ENV_CREDENTIALS_PATH) {
        config.credentials.credentials_path = value.to_string();
    }
    if let Some(value) = env.get(ENV_OAUTH_KEYS_PATH) {
        config.credentials.oauth_keys_path = value.to_string();
    }

    if let Some(value) = env.get(ENV_LOG_FORMAT) {
        config.observability.log_format =
            value.parse::<LogFormat>().map_err(|reason| ConfigError::Env {
                key: ENV_LOG_FORMAT,
                value: value.to_string(),
                reason,
            })?;
    }
    if let Some(value) = env.get(ENV_METRICS_ADDRESS) {
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = value.to_string();
    }

    Ok(())
}

/// Split a comma-separated list, dropping empty entries and duplicates.
pub fn split_list(value: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for item in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !items.iter().any(|existing| existing == item) {
            items.push(item.to_string());
        }
    }
    items
}

fn parse_bool(env: &EnvSnapshot, key: &'static str) -> Result<Option<bool>, ConfigError> {
    let Some(value) = env.get(key) else {
        return Ok(None);
    };
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(Some(true)),
        "false" | "0" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::Env {
            key,
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

fn parse_port(env: &EnvSnapshot, key: &'static str) -> Result<Option<u16>, ConfigError> {
    let Some(value) = env.get(key) else {
        return Ok(None);
    };
    value
        .parse::<u16>()
        .map(Some)
        .map_err(|e| ConfigError::Env {
            key,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn environment_overrides_defaults() {
        let env = EnvSnapshot::from_pairs([
            (ENV_TRANSPORT, "both"),
            (ENV_PORT, "3000"),
            (ENV_DUAL_STACK, "off"),
            (ENV_PREFER_IPV6, "YES"),
            (ENV_ALLOWED_ORIGINS, "https://a.example, https://*.b.example,,https://a.example"),
        ]);

        let config = load(None, &env, &ConfigOverrides::default()).unwrap();
        assert_eq!(config.transport.mode, TransportMode::Both);
        assert_eq!(config.network.port, Some(3000));
        assert!(!config.network.dual_stack);
        assert!(config.network.prefer_ipv6);
        assert_eq!(
            config.cors.allowed_origins,
            vec!["https://a.example".to_string(), "https://*.b.example".to_string()]
        );
    }

    #[test]
    fn platform_port_is_fallback() {
        let env = EnvSnapshot::from_pairs([(ENV_PLATFORM_PORT, "8080")]);
        let config = load(None, &env, &ConfigOverrides::default()).unwrap();
        assert_eq!(config.network.port, Some(8080));

        let env = EnvSnapshot::from_pairs([(ENV_PLATFORM_PORT, "8080"), (ENV_PORT, "9000")]);
        let config = load(None, &env, &ConfigOverrides::default()).unwrap();
        assert_eq!(config.network.port, Some(9000));
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let env = EnvSnapshot::from_pairs([(ENV_PORT, "70000")]);
        match load(None, &env, &ConfigOverrides::default()) {
            Err(ConfigError::Env { key, .. }) => assert_eq!(key, ENV_PORT),
            other => panic!("unexpected result: {:?}", other),
        }

        let env = EnvSnapshot::from_pairs([(ENV_DUAL_STACK, "maybe")]);
        assert!(matches!(
            load(None, &env, &ConfigOverrides::default()),
            Err(ConfigError::Env { key: ENV_DUAL_STACK, .. })
        ));

        let env = EnvSnapshot::from_pairs([(ENV_TRANSPORT, "carrier-pigeon")]);
        assert!(matches!(
            load(None, &env, &ConfigOverrides::default()),
            Err(ConfigError::Env { key: ENV_TRANSPORT, .. })
        ));
    }

    #[test]
    fn network_mode_without_port_fails_validation() {
        let env = EnvSnapshot::from_pairs([(ENV_TRANSPORT, "network")]);
        assert!(matches!(
            load(None, &env, &ConfigOverrides::default()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn file_then_env_then_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[transport]\nmode = \"network\"\n[network]\nport = 4000\n[cors]\nallowed_origins = [\"https://file.example\"]"
        )
        .unwrap();

        let env = EnvSnapshot::from_pairs([(ENV_PORT, "4001")]);
        let overrides = ConfigOverrides {
            mode: Some(TransportMode::Both),
            port: None,
        };

        let config = load(Some(file.path()), &env, &overrides).unwrap();
        assert_eq!(config.transport.mode, TransportMode::Both);
        assert_eq!(config.network.port, Some(4001));
        assert_eq!(config.cors.allowed_origins, vec!["https://file.example".to_string()]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = load(
            Some(Path::new("/definitely/not/here.toml")),
            &EnvSnapshot::default(),
            &ConfigOverrides::default(),
        );
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
