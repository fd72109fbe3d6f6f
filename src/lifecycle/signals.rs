//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT (Ctrl+C) or SIGTERM
//! - Report which one arrived
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A handler that cannot be registered is logged and never fires

use std::future::pending;

/// Resolve when an interrupt or termination signal arrives.
pub async fn wait_for_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => Some(term),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                None
            }
        };

        tokio::select! {
            _ = ctrl_c() => "SIGINT",
            _ = async {
                match term.as_mut() {
                    Some(term) => { term.recv().await; }
                    None => pending::<()>().await,
                }
            } => "SIGTERM",
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c().await;
        "ctrl-c"
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
        pending::<()>().await;
    }
}
