//! Boundary to the external tool-dispatch core and credential subsystem.
//!
//! # Data Flow
//! ```text
//! stdio transport ─┐
//!                  ├→ rpc::RpcRouter → DispatchCore::handle(method, params)
//! HTTP bridge ─────┘
//!
//! /health → CredentialStatus (existence only)
//! ```
//!
//! Both transports share one `Arc<dyn DispatchCore>`; neither holds
//! transport-level state inside it.

pub mod registry;

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::CredentialsConfig;

pub use registry::{ToolDefinition, ToolRegistry};

/// Failure reported by the dispatch core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    /// A structured protocol error, relayed to the caller unchanged.
    #[error("{message} (code {code})")]
    Rpc {
        code: i32,
        message: String,
        data: Option<Value>,
    },

    /// Anything else; surfaced as `-32603 Internal error`.
    #[error("{0}")]
    Internal(String),
}

impl DispatchError {
    pub fn rpc(code: i32, message: impl Into<String>) -> Self {
        DispatchError::Rpc {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// The single call contract both transports use.
#[async_trait]
pub trait DispatchCore: Send + Sync + fmt::Debug {
    /// Whether `method` is handled by this core (e.g. `tools/list`, `tools/call`).
    fn recognizes(&self, method: &str) -> bool;

    async fn handle(&self, method: &str, params: Option<Value>) -> Result<Value, DispatchError>;

    /// Availability for the health endpoint.
    fn is_available(&self) -> bool {
        true
    }

    /// Extra health details (tool counts and the like).
    fn describe(&self) -> Value {
        Value::Null
    }
}

/// Credential presence as seen by the health aggregator.
pub trait CredentialStatus: Send + Sync + fmt::Debug {
    fn credentials_file_present(&self) -> bool;
    fn oauth_keys_present(&self) -> bool;
}

/// Existence checks against the configured credential files.
#[derive(Debug, Clone)]
pub struct FileCredentials {
    credentials_path: PathBuf,
    oauth_keys_path: PathBuf,
}

impl FileCredentials {
    pub fn new(credentials_path: impl Into<PathBuf>, oauth_keys_path: impl Into<PathBuf>) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            oauth_keys_path: oauth_keys_path.into(),
        }
    }

    pub fn from_config(config: &CredentialsConfig) -> Self {
        Self::new(&config.credentials_path, &config.oauth_keys_path)
    }

    pub fn credentials_path(&self) -> &Path {
        &self.credentials_path
    }

    pub fn oauth_keys_path(&self) -> &Path {
        &self.oauth_keys_path
    }
}

impl CredentialStatus for FileCredentials {
    fn credentials_file_present(&self) -> bool {
        self.credentials_path.is_file()
    }

    fn oauth_keys_present(&self) -> bool {
        self.oauth_keys_path.is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_credentials_check_existence_only() {
        let dir = tempfile::tempdir().unwrap();
        let creds = dir.path().join("credentials.json");
        let keys = dir.path().join("keys.json");

        let status = FileCredentials::new(&creds, &keys);
        assert!(!status.credentials_file_present());
        assert!(!status.oauth_keys_present());

        std::fs::write(&creds, "not even json").unwrap();
        assert!(status.credentials_file_present());
        assert!(!status.oauth_keys_present());
    }
}
