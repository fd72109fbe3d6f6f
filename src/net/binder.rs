//! Listener binding with a fallback cascade.
//!
//! # Responsibilities
//! - Try bind candidates strictly in order, each with a hard timeout
//! - Relax `IPV6_V6ONLY` on the dual-stack candidate when the platform allows
//! - Record every attempt; return the first success or the last error
//!
//! # Design Decisions
//! - Never returns `Err`: exhaustion is reported as `success = false`
//! - A later candidate is never started before the earlier one resolves
//! - The caller treats exhaustion as fatal; there is no retry loop here

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use serde::Serialize;
use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tokio::net::TcpListener;

use crate::net::{AddressFamily, BindCandidate};
use crate::observability::metrics;

/// Default per-candidate bind timeout.
pub const DEFAULT_BIND_TIMEOUT: Duration = Duration::from_secs(5);

const LISTEN_BACKLOG: i32 = 1024;

/// Why a bind attempt (or the whole cascade) failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BindError {
    #[error("no bind candidates to try")]
    NoCandidates,

    #[error("bind {addr} failed: {message}")]
    Io { addr: SocketAddr, message: String },

    #[error("bind {addr} timed out after {timeout_ms}ms")]
    Timeout {
        addr: SocketAddr,
        #[serde(rename = "timeoutMs")]
        timeout_ms: u64,
    },

    #[error("bind task for {addr} aborted: {message}")]
    Task { addr: SocketAddr, message: String },
}

impl BindError {
    fn io(addr: SocketAddr, error: &io::Error) -> Self {
        BindError::Io {
            addr,
            message: error.to_string(),
        }
    }
}

/// Record of one candidate attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BindAttempt {
    pub address: IpAddr,
    pub port: u16,
    pub family: AddressFamily,
    pub dual_stack_requested: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BindError>,
}

/// Result of running the cascade. Exactly one exists per network listener.
#[derive(Debug)]
pub struct BindOutcome {
    pub success: bool,
    /// Achieved address (or, on failure, the last one tried).
    pub address: Option<IpAddr>,
    pub port: u16,
    pub family: Option<AddressFamily>,
    /// True only if the socket actually accepts IPv4-mapped connections.
    pub dual_stack: bool,
    pub error: Option<BindError>,
    pub attempts: Vec<BindAttempt>,
    listener: Option<TcpListener>,
}

impl BindOutcome {
    fn failed(port: u16, error: BindError, attempts: Vec<BindAttempt>) -> Self {
        let last = attempts.last();
        Self {
            success: false,
            address: last.map(|a| a.address),
            port,
            family: last.map(|a| a.family),
            dual_stack: false,
            error: Some(error),
            attempts,
            listener: None,
        }
    }

    /// Take ownership of the bound listener. Returns `None` after the first call.
    pub fn take_listener(&mut self) -> Option<TcpListener> {
        self.listener.take()
    }

    /// Serializable snapshot for health and status reporting.
    pub fn summary(&self) -> BindSummary {
        BindSummary {
            success: self.success,
            address: self.address.map(|a| a.to_string()),
            port: self.port,
            family: self.family,
            dual_stack: self.dual_stack,
            error: self.error.clone(),
            attempts: self.attempts.clone(),
        }
    }
}

/// Serializable view of a `BindOutcome`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BindSummary {
    pub success: bool,
    pub address: Option<String>,
    pub port: u16,
    pub family: Option<AddressFamily>,
    pub dual_stack: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BindError>,
    pub attempts: Vec<BindAttempt>,
}

/// Executes a bind plan.
#[derive(Debug, Clone)]
pub struct SocketBinder {
    timeout: Duration,
}

impl SocketBinder {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Try each candidate in order on `port`; the first success wins.
    pub async fn bind(&self, candidates: &[BindCandidate], port: u16) -> BindOutcome {
        let mut attempts = Vec::with_capacity(candidates.len());
        let mut last_error = BindError::NoCandidates;

        for candidate in candidates {
            let addr = candidate.socket_addr(port);
            match self.attempt(candidate, addr).await {
                Ok((listener, dual_stack)) => {
                    let local = listener.local_addr().unwrap_or(addr);
                    metrics::record_bind_attempt(candidate.family, true);
                    attempts.push(BindAttempt {
                        address: candidate.address,
                        port,
                        family: candidate.family,
                        dual_stack_requested: candidate.dual_stack,
                        error: None,
                    });

                    if candidate.dual_stack && !dual_stack {
                        tracing::warn!(
                            address = %local,
                            "Dual-stack unavailable; listener is IPv6-only"
                        );
                    }
                    tracing::info!(
                        address = %local,
                        family = %candidate.family,
                        dual_stack,
                        attempt = attempts.len(),
                        "Listener bound"
                    );

                    return BindOutcome {
                        success: true,
                        address: Some(local.ip()),
                        port: local.port(),
                        family: Some(candidate.family),
                        dual_stack,
                        error: None,
                        attempts,
                        listener: Some(listener),
                    };
                }
                Err(error) => {
                    metrics::record_bind_attempt(candidate.family, false);
                    tracing::warn!(
                        address = %candidate.address,
                        port,
                        family = %candidate.family,
                        error = %error,
                        "Bind candidate failed"
                    );
                    attempts.push(BindAttempt {
                        address: candidate.address,
                        port,
                        family: candidate.family,
                        dual_stack_requested: candidate.dual_stack,
                        error: Some(error.clone()),
                    });
                    last_error = error;
                }
            }
        }

        tracing::error!(
            port,
            attempts = attempts.len(),
            error = %last_error,
            "Bind cascade exhausted"
        );
        BindOutcome::failed(port, last_error, attempts)
    }

    async fn attempt(
        &self,
        candidate: &BindCandidate,
        addr: SocketAddr,
    ) -> Result<(TcpListener, bool), BindError> {
        let dual_stack = candidate.dual_stack;
        // A timed-out task still finishes on the blocking pool; its socket is
        // dropped (and closed) with the unclaimed output.
        let task = tokio::task::spawn_blocking(move || open_listener(addr, dual_stack));

        let (std_listener, achieved_dual) = match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(bound))) => bound,
            Ok(Ok(Err(e))) => return Err(BindError::io(addr, &e)),
            Ok(Err(e)) => {
                return Err(BindError::Task {
                    addr,
                    message: e.to_string(),
                })
            }
            Err(_) => {
                return Err(BindError::Timeout {
                    addr,
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
        };

        let listener = TcpListener::from_std(std_listener).map_err(|e| BindError::io(addr, &e))?;
        Ok((listener, achieved_dual))
    }
}

impl Default for SocketBinder {
    fn default() -> Self {
        Self::new(DEFAULT_BIND_TIMEOUT)
    }
}

/// Open a non-blocking listening socket. Returns whether it accepts IPv4-mapped peers.
fn open_listener(addr: SocketAddr, dual_stack: bool) -> io::Result<(std::net::TcpListener, bool)> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;

    // IPV6_V6ONLY is only honoured before bind.
    if addr.is_ipv6() && dual_stack {
        if let Err(e) = socket.set_only_v6(false) {
            tracing::debug!(address = %addr, error = %e, "Cannot clear IPV6_V6ONLY");
        }
    }

    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    let accepts_ipv4 = addr.is_ipv6() && socket.only_v6().map(|only| !only).unwrap_or(false);
    Ok((socket.into(), accepts_ipv4))
}
