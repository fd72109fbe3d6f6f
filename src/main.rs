//! MCP transport server
//!
//! Serves the tool-dispatch core over stdio, HTTP, or both.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌───────────────────────────────────────────────────────┐
//!                    │                   TRANSPORT LAYER                     │
//!                    │                                                       │
//!   stdin/stdout ────┼─▶ transport::stdio ───────────────┐                   │
//!                    │                                   ▼                   │
//!                    │                            ┌─────────────┐            │
//!                    │                            │ rpc::router │──▶ dispatch│
//!                    │                            └─────────────┘    core    │
//!                    │                                   ▲                   │
//!   HTTP client ─────┼─▶ net (probe/plan/bind) ─▶ http ──┘                   │
//!                    │                           │  access gate              │
//!                    │                           │  /health aggregation      │
//!                    │                                                       │
//!                    │  ┌─────────────────────────────────────────────────┐  │
//!                    │  │ config · security · health · observability ·    │  │
//!                    │  │ lifecycle (supervisor, signals, shutdown)       │  │
//!                    │  └─────────────────────────────────────────────────┘  │
//!                    └───────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde_json::json;

use mcp_transport::config::{self, ConfigOverrides, EnvSnapshot, PolicyWatcher, TransportMode};
use mcp_transport::dispatch::{DispatchError, FileCredentials, ToolDefinition, ToolRegistry};
use mcp_transport::observability::{logging, metrics};
use mcp_transport::TransportSupervisor;

#[derive(Parser)]
#[command(name = "mcp-transport")]
#[command(about = "Serve the tool-dispatch core over stdio and/or HTTP", long_about = None)]
struct Cli {
    /// TOML configuration file (overrides MCP_CONFIG_FILE)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Transport mode: point-to-point (stdio), network (http) or both
    #[arg(short, long)]
    mode: Option<TransportMode>,

    /// Network port (overrides MCP_PORT / PORT)
    #[arg(short, long)]
    port: Option<u16>,
}

fn build_registry() -> ToolRegistry {
    ToolRegistry::new().register(
        ToolDefinition::new("server_info", "Report transport server name and version"),
        |_| async move {
            Ok::<_, DispatchError>(json!({
                "content": [{
                    "type": "text",
                    "text": format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
                }]
            }))
        },
    )
}

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            eprintln!("mcp-transport: {}", e);
            1
        }
    };
    // Exit explicitly: a pending blocking stdin read would otherwise hold the runtime open.
    std::process::exit(code);
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let env = EnvSnapshot::capture();
    let overrides = ConfigOverrides {
        mode: cli.mode,
        port: cli.port,
    };
    let config_path = cli.config.or_else(|| env.config_file());

    let config = config::load(config_path.as_deref(), &env, &overrides)?;

    logging::init_logging(&config.observability);
    tracing::info!("{} v{} starting", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    tracing::info!(
        mode = %config.transport.mode,
        port = ?config.network.port,
        bind_address = %config.network.bind_address,
        enable_ipv6 = config.network.enable_ipv6,
        prefer_ipv6 = config.network.prefer_ipv6,
        dual_stack = config.network.dual_stack,
        allowed_origins = config.cors.allowed_origins.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let supervisor = Arc::new(TransportSupervisor::new(
        &config,
        Arc::new(build_registry()),
        Arc::new(FileCredentials::from_config(&config.credentials)),
    ));

    // Kept alive for the life of the process.
    let _watcher = match &config_path {
        Some(path) => {
            let watcher = PolicyWatcher::new(
                path,
                env.clone(),
                overrides.clone(),
                Arc::clone(supervisor.policy_store()),
            );
            match watcher.run() {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    tracing::warn!(error = %e, "Config hot reload disabled");
                    None
                }
            }
        }
        None => None,
    };

    supervisor.initialize(config.transport.mode).await?;
    supervisor.setup_graceful_shutdown();
    supervisor.wait_for_exit().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
