//! MCP transport layer library.
//!
//! Exposes a tool-dispatch core over stdio and, optionally, an HTTP bridge
//! with IPv4/IPv6 bind fallback and origin-based access control.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod rpc;
pub mod security;
pub mod transport;

pub use config::AppConfig;
pub use error::{ShutdownError, TransportError};
pub use http::ProtocolBridge;
pub use lifecycle::{Shutdown, TransportSupervisor};
