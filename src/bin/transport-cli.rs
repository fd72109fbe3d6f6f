use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::header::{ACCESS_CONTROL_REQUEST_METHOD, ORIGIN};
use serde_json::{json, Value};

use mcp_transport::config::NetworkConfig;
use mcp_transport::net::{BindingPlanner, StackProber};

#[derive(Parser)]
#[command(name = "transport-cli")]
#[command(about = "Operator CLI for the MCP transport layer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe IPv4/IPv6 locally and print the bind plan
    Probe {
        #[arg(short, long, default_value_t = 3000)]
        port: u16,

        #[arg(long)]
        prefer_ipv6: bool,

        #[arg(long)]
        no_dual_stack: bool,

        #[arg(long)]
        disable_ipv6: bool,

        #[arg(long, default_value = "")]
        bind_address: String,
    },
    /// Fetch /health from a running server
    Health {
        #[arg(short, long, default_value = "http://localhost:3000")]
        url: String,
    },
    /// Send a CORS preflight for an origin and print the verdict
    Preflight {
        #[arg(short, long, default_value = "http://localhost:3000")]
        url: String,

        #[arg(short, long)]
        origin: String,

        #[arg(long, default_value = "/mcp")]
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Probe {
            port,
            prefer_ipv6,
            no_dual_stack,
            disable_ipv6,
            bind_address,
        } => {
            let network = NetworkConfig {
                port: Some(port),
                bind_address,
                enable_ipv6: !disable_ipv6,
                prefer_ipv6,
                dual_stack: !no_dual_stack,
                ..NetworkConfig::default()
            };
            let prefs = network.preferences();
            let stack = StackProber::default().probe().await;
            let plan: Vec<Value> = BindingPlanner::plan(&prefs, &stack)
                .iter()
                .map(|c| {
                    json!({
                        "address": c.socket_addr(prefs.port).to_string(),
                        "family": c.family,
                        "dualStack": c.dual_stack,
                    })
                })
                .collect();
            let report = json!({ "preferences": prefs, "availability": stack, "plan": plan });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Health { url } => {
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()?;
            let res = client
                .get(format!("{}/health", url.trim_end_matches('/')))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Preflight { url, origin, path } => {
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()?;
            let res = client
                .request(
                    reqwest::Method::OPTIONS,
                    format!("{}{}", url.trim_end_matches('/'), path),
                )
                .header(ORIGIN, &origin)
                .header(ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .send()
                .await?;

            let status = res.status();
            let headers: serde_json::Map<String, Value> = res
                .headers()
                .iter()
                .filter(|(name, _)| name.as_str().starts_with("access-control-"))
                .map(|(name, value)| {
                    (
                        name.to_string(),
                        Value::String(value.to_str().unwrap_or_default().to_string()),
                    )
                })
                .collect();
            let body: Value = res.json().await.unwrap_or(Value::Null);

            let verdict = json!({
                "origin": origin,
                "allowed": status.is_success(),
                "status": status.as_u16(),
                "headers": headers,
                "body": body,
            });
            println!("{}", serde_json::to_string_pretty(&verdict)?);
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
    }
    Ok(())
}
