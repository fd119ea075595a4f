//! Node command - run a stowage node.
//!
//! Starts the in-memory deal engine and serves the gRPC API until a
//! shutdown signal arrives.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use eyre::Result;
use stowage_deals_api::StorageAsk;
use stowage_deals_memory::MemoryDealEngine;
use stowage_rpc_server::{GrpcServer, GrpcServerConfig};
use tracing::{error, info};

use crate::cli::NodeArgs;
use crate::config::NodeConfig;

/// Ask lifetime advertised by the dev market.
const ASK_TTL_SECS: u64 = 24 * 60 * 60;

/// Run the node command
pub async fn run(args: NodeArgs) -> Result<()> {
    // Load configuration (defaults < env < config file)
    let mut config = NodeConfig::load(args.config.as_deref())?;

    // Apply CLI overrides (CLI has highest priority)
    config.api = args.api.clone();

    let asks = dev_ask_table();
    info!(asks = asks.len(), "starting in-memory deal engine");
    let engine = Arc::new(MemoryDealEngine::new(asks));

    if config.api.disable_grpc {
        info!("gRPC API disabled, nothing to serve");
        return Ok(());
    }

    let grpc_config = GrpcServerConfig {
        addr: config.grpc_socket_addr(),
    };
    info!(addr = %grpc_config.addr, "starting gRPC server");
    let server = GrpcServer::with_config(grpc_config, engine);

    let server_task = {
        let server = server.clone();
        tokio::spawn(async move {
            if let Err(err) = server.start().await {
                error!(error = %err, "gRPC server exited");
            }
        })
    };

    info!("node running (press Ctrl+C to stop)");
    tokio::signal::ctrl_c().await?;
    info!("received shutdown signal");

    server.stop().await?;
    server_task.await?;

    info!("node shutdown complete");
    Ok(())
}

/// Static ask table served by the dev market.
fn dev_ask_table() -> Vec<StorageAsk> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    [
        ("t01000", 80u64, 256u64),
        ("t01001", 120, 1024),
        ("t02004", 250, 131_072),
    ]
    .into_iter()
    .map(|(miner, price, min_piece_size)| StorageAsk {
        price,
        min_piece_size,
        miner: miner.to_owned(),
        timestamp: now,
        expiry: now + ASK_TTL_SECS,
    })
    .collect()
}
