//! mqrpc-agent - a minimal agent process answering requests for one server id
//!
//! Connects in agent mode with an echo handler and runs until interrupted.
//! Useful for wiring checks against a live broker.

use clap::Parser;
use mqrpc::observability::init_default_logging;
use mqrpc::protocol::RpcRequest;
use mqrpc::{RequestHandler, RpcClient, RpcConfig};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "mqrpc-agent", about = "Echo agent for mqrpc wiring checks")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "MQRPC_CONFIG")]
    config: Option<PathBuf>,

    /// Server id this agent answers for
    #[arg(long, env = "MQRPC_SERVER_ID")]
    server_id: Option<String>,

    /// Broker host (overrides the config file)
    #[arg(long)]
    host: Option<String>,

    /// Broker port (overrides the config file)
    #[arg(long)]
    port: Option<u16>,

    /// Worker-pool bound for request handling
    #[arg(long)]
    workers: Option<usize>,
}

/// Echoes the invoked method and params back to the result topic
struct EchoAgent;

#[async_trait::async_trait]
impl RequestHandler for EchoAgent {
    async fn handle(&self, request: RpcRequest) -> Option<Value> {
        info!(id = %request.id, classname = %request.classname, method = %request.method,
            "echoing request");
        Some(json!({
            "id": request.id,
            "classname": request.classname,
            "method": request.method,
            "params": request.params,
        }))
    }
}

fn build_config(args: &Args) -> Result<RpcConfig, Box<dyn std::error::Error>> {
    let mut config = match (&args.config, &args.server_id) {
        (Some(path), _) => RpcConfig::from_file(path)?,
        (None, Some(server_id)) => RpcConfig::new(server_id.clone()),
        (None, None) => return Err("either --config or --server-id is required".into()),
    };

    if let Some(server_id) = &args.server_id {
        config.server_id = server_id.clone();
    }
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(workers) = args.workers {
        config.agent_workers = workers;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_default_logging();

    let args = Args::parse();
    let config = build_config(&args)?;

    info!(
        server_id = %config.server_id,
        host = %config.host,
        port = config.port,
        "starting agent"
    );

    let client = RpcClient::connect_with_handler(config, Arc::new(EchoAgent)).await?;

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    if let Err(e) = client.close().await {
        error!("error during shutdown: {}", e);
    }
    Ok(())
}
