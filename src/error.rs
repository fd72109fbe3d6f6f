//! Top-level error types.

use std::fmt;
use std::io;

use serde::Serialize;
use thiserror::Error;

use crate::config::{ConfigError, TransportMode, ValidationError};
use crate::http::BridgeError;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("network transport failed: {0}")]
    Bridge(#[from] BridgeError),

    #[error("transports already initialized in mode '{0}'")]
    AlreadyInitialized(TransportMode),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}

/// One transport's failure during shutdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransportFailure {
    pub transport: &'static str,
    pub error: String,
}

/// Every failure collected while stopping the transports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ShutdownError {
    pub failures: Vec<TransportFailure>,
}

impl fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shutdown failed:")?;
        for failure in &self.failures {
            write!(f, " [{}: {}]", failure.transport, failure.error)?;
        }
        Ok(())
    }
}
