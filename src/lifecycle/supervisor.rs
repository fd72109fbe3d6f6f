//! Transport supervisor: starts the configured transports, reports their
//! state and shuts them down together.
//!
//! # Design Decisions
//! - No half-started state: if a required transport fails to start, the
//!   ones already started are stopped and the error propagates
//! - Shutdown stops each transport independently and reports every failure
//! - Signal handlers are installed at most once per supervisor

use std::future::pending;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;

use crate::config::{AppConfig, NetworkConfig, TransportMode, ValidationError};
use crate::dispatch::{CredentialStatus, DispatchCore};
use crate::error::{ShutdownError, TransportError, TransportFailure};
use crate::health::HealthAggregator;
use crate::http::{BridgeState, ProtocolBridge};
use crate::lifecycle::signals;
use crate::lifecycle::Shutdown;
use crate::net::{BindSummary, RequestTracker};
use crate::rpc::{RpcRouter, ServerInfo};
use crate::security::{AccessGate, AccessPolicy, PolicyStore, PolicySummary};
use crate::transport::{StdioHandle, StdioTransport};

type BoxedReader = Box<dyn AsyncRead + Unpin + Send>;
type BoxedWriter = Box<dyn AsyncWrite + Unpin + Send>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointToPointHandle {
    pub running: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkHandle {
    pub state: BridgeState,
    pub address: Option<SocketAddr>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportHandles {
    pub point_to_point: Option<PointToPointHandle>,
    pub network: Option<NetworkHandle>,
}

/// Which transports are up, and whether every required one started.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportState {
    pub mode: Option<TransportMode>,
    pub handles: TransportHandles,
    pub healthy: bool,
}

/// `TransportState` plus the live bind and policy snapshots.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportStatus {
    #[serde(flatten)]
    pub state: TransportState,
    pub bind: Option<BindSummary>,
    pub access_policy: PolicySummary,
}

#[derive(Default)]
struct Inner {
    mode: Option<TransportMode>,
    starting: Option<TransportMode>,
    bridge: Option<Arc<ProtocolBridge>>,
    stdio: Option<StdioHandle>,
    stdio_io: Option<(BoxedReader, BoxedWriter)>,
    healthy: bool,
}

pub struct TransportSupervisor {
    network: NetworkConfig,
    rpc: RpcRouter,
    gate: AccessGate,
    health: Arc<HealthAggregator>,
    tracker: RequestTracker,
    inner: Mutex<Inner>,
    exit: Shutdown,
    signals_installed: AtomicBool,
}

impl std::fmt::Debug for TransportSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSupervisor")
            .field("exit", &self.exit.is_triggered())
            .finish_non_exhaustive()
    }
}

impl TransportSupervisor {
    pub fn new(
        config: &AppConfig,
        core: Arc<dyn DispatchCore>,
        credentials: Arc<dyn CredentialStatus>,
    ) -> Self {
        let store = Arc::new(PolicyStore::new(AccessPolicy::from_config(&config.cors)));
        let tracker = RequestTracker::new();
        let health = Arc::new(HealthAggregator::new(
            config.network.preferences(),
            Arc::clone(&core),
            credentials,
            Arc::clone(&store),
            tracker.clone(),
        ));

        Self {
            network: config.network.clone(),
            rpc: RpcRouter::new(core, ServerInfo::default()),
            gate: AccessGate::new(store),
            health,
            tracker,
            inner: Mutex::new(Inner::default()),
            exit: Shutdown::new(),
            signals_installed: AtomicBool::new(false),
        }
    }

    /// Serve the point-to-point transport over `reader`/`writer` instead of
    /// the process's stdin/stdout.
    pub fn with_point_to_point_io<R, W>(self, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        if let Ok(mut inner) = self.inner.try_lock() {
            inner.stdio_io = Some((Box::new(reader), Box::new(writer)));
        }
        self
    }

    pub fn policy_store(&self) -> &Arc<PolicyStore> {
        self.gate.store()
    }

    pub fn health(&self) -> &Arc<HealthAggregator> {
        &self.health
    }

    /// Latch triggered once shutdown has completed.
    pub fn exit_signal(&self) -> Shutdown {
        self.exit.clone()
    }

    /// Start the transports `mode` requires. All or nothing.
    ///
    /// The state lock is only held to claim and to commit, so `status()`
    /// stays responsive while the bridge probes and binds.
    pub async fn initialize(&self, mode: TransportMode) -> Result<(), TransportError> {
        let stdio_io = {
            let mut inner = self.inner.lock().await;
            if let Some(current) = inner.mode.or(inner.starting) {
                return Err(TransportError::AlreadyInitialized(current));
            }
            if mode.wants_network() && self.network.port.is_none() {
                return Err(ValidationError::MissingPort {
                    mode: mode.to_string(),
                }
                .into());
            }
            inner.starting = Some(mode);
            if mode.wants_point_to_point() {
                inner.stdio_io.take()
            } else {
                None
            }
        };

        tracing::info!(mode = %mode, "Initializing transports");

        match self.start_transports(mode, stdio_io).await {
            Ok((stdio, bridge)) => {
                let mut inner = self.inner.lock().await;
                inner.starting = None;
                inner.mode = Some(mode);
                inner.stdio = stdio;
                inner.bridge = bridge;
                inner.healthy = true;
                tracing::info!(mode = %mode, "Transports initialized");
                Ok(())
            }
            Err(e) => {
                let mut inner = self.inner.lock().await;
                inner.starting = None;
                inner.healthy = false;
                Err(e)
            }
        }
    }

    async fn start_transports(
        &self,
        mode: TransportMode,
        stdio_io: Option<(BoxedReader, BoxedWriter)>,
    ) -> Result<(Option<StdioHandle>, Option<Arc<ProtocolBridge>>), TransportError> {
        let stdio = if mode.wants_point_to_point() {
            let transport = StdioTransport::new(self.rpc.clone())
                .with_grace(Duration::from_secs(self.network.shutdown_grace_secs));
            Some(match stdio_io {
                Some((reader, writer)) => transport.start_with(reader, writer),
                None => transport.start(),
            })
        } else {
            None
        };

        if !mode.wants_network() {
            return Ok((stdio, None));
        }

        let bridge = Arc::new(ProtocolBridge::new(
            self.network.clone(),
            self.rpc.clone(),
            self.gate.clone(),
            Arc::clone(&self.health),
            self.tracker.clone(),
        ));
        if let Err(e) = bridge.start().await {
            tracing::error!(mode = %mode, error = %e, "Network transport failed to start");
            if let Some(stdio) = stdio {
                if let Err(stop_error) = stdio.stop().await {
                    tracing::warn!(error = %stop_error, "Failed to stop stdio transport after aborted start");
                }
            }
            return Err(e.into());
        }
        Ok((stdio, Some(bridge)))
    }

    /// Stop every active transport. Each is stopped even if another fails.
    pub async fn shutdown(&self) -> Result<(), ShutdownError> {
        let (bridge, stdio) = {
            let mut inner = self.inner.lock().await;
            inner.healthy = false;
            inner.mode = None;
            (inner.bridge.take(), inner.stdio.take())
        };

        let stop_network = async {
            match bridge {
                Some(bridge) => bridge.stop().await.map_err(|e| e.to_string()),
                None => Ok(()),
            }
        };
        let stop_stdio = async {
            match stdio {
                Some(stdio) => stdio.stop().await.map_err(|e| e.to_string()),
                None => Ok(()),
            }
        };
        let (network, point_to_point) = tokio::join!(stop_network, stop_stdio);

        let failures: Vec<TransportFailure> = [("network", network), ("point-to-point", point_to_point)]
            .into_iter()
            .filter_map(|(transport, result)| {
                result.err().map(|error| TransportFailure { transport, error })
            })
            .collect();

        self.exit.trigger();
        if failures.is_empty() {
            tracing::info!("Transports shut down");
            Ok(())
        } else {
            for failure in &failures {
                tracing::error!(transport = failure.transport, error = %failure.error, "Transport failed to stop");
            }
            Err(ShutdownError { failures })
        }
    }

    pub async fn status(&self) -> TransportStatus {
        let inner = self.inner.lock().await;
        let handles = TransportHandles {
            point_to_point: inner.stdio.as_ref().map(|h| PointToPointHandle {
                running: h.is_running(),
            }),
            network: inner.bridge.as_ref().map(|b| NetworkHandle {
                state: b.state(),
                address: b.local_addr(),
            }),
        };

        TransportStatus {
            state: TransportState {
                mode: inner.mode,
                handles,
                healthy: inner.healthy,
            },
            bind: self.health.bind_summary().map(|s| (*s).clone()),
            access_policy: self.gate.policy().summary(),
        }
    }

    /// Install SIGINT/SIGTERM handling that runs `shutdown()` and then
    /// releases `wait_for_exit`. Returns false if already installed.
    pub fn setup_graceful_shutdown(self: &Arc<Self>) -> bool {
        if self.signals_installed.swap(true, Ordering::SeqCst) {
            tracing::debug!("Signal handlers already installed");
            return false;
        }

        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            let signal = signals::wait_for_signal().await;
            tracing::info!(signal, "Shutdown signal received");
            if let Err(e) = supervisor.shutdown().await {
                tracing::error!(error = %e, "Graceful shutdown incomplete");
            }
        });
        true
    }

    /// Block until shutdown completes. In point-to-point mode, the channel
    /// closing (EOF on stdin) also shuts down.
    pub async fn wait_for_exit(&self) -> Result<(), ShutdownError> {
        let stdio_closed = {
            let inner = self.inner.lock().await;
            match inner.mode {
                Some(TransportMode::PointToPoint) => inner.stdio.as_ref().map(|h| h.closed()),
                _ => None,
            }
        };

        tokio::select! {
            _ = self.exit.wait() => Ok(()),
            _ = async {
                match stdio_closed {
                    Some(closed) => closed.wait().await,
                    None => pending::<()>().await,
                }
            } => {
                tracing::info!("Point-to-point channel closed; shutting down");
                self.shutdown().await
            }
        }
    }
}
