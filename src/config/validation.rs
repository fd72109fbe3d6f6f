//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that the selected mode has what it needs (port for the network transport)
//! - Validate value ranges (timeouts > 0, literal bind address)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before any socket is opened

use std::net::IpAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("network.port is required when transport mode is '{mode}'")]
    MissingPort { mode: String },

    #[error("network.bind_address '{0}' is not a literal IP address")]
    InvalidBindAddress(String),

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("network.max_body_size must be greater than zero")]
    ZeroBodyLimit,

    #[error("cors.allowed_origins contains an empty pattern at index {0}")]
    EmptyOriginPattern(usize),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Validate a fully merged configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.transport.mode.wants_network() && config.network.port.is_none() {
        errors.push(ValidationError::MissingPort {
            mode: config.transport.mode.to_string(),
        });
    }

    let bind = config.network.bind_address.trim();
    if !bind.is_empty()
        && bind
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidBindAddress(bind.to_string()));
    }

    let durations = [
        ("network.probe_timeout_ms", config.network.probe_timeout_ms),
        ("network.bind_timeout_ms", config.network.bind_timeout_ms),
        ("network.request_timeout_secs", config.network.request_timeout_secs),
    ];
    for (field, value) in durations {
        if value == 0 {
            errors.push(ValidationError::ZeroDuration { field });
        }
    }

    if config.network.max_body_size == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    for (index, pattern) in config.cors.allowed_origins.iter().enumerate() {
        if pattern.trim().is_empty() {
            errors.push(ValidationError::EmptyOriginPattern(index));
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TransportMode;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn network_mode_requires_port() {
        let mut config = AppConfig::default();
        config.transport.mode = TransportMode::Both;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::MissingPort { mode: "both".into() }]
        );

        config.network.port = Some(0);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = AppConfig::default();
        config.transport.mode = TransportMode::Network;
        config.network.bind_address = "not-an-ip".into();
        config.network.bind_timeout_ms = 0;
        config.cors.allowed_origins = vec!["https://ok.example".into(), "  ".into()];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::EmptyOriginPattern(1)));
        assert!(errors.contains(&ValidationError::ZeroDuration {
            field: "network.bind_timeout_ms"
        }));
    }
}
