use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use wchain_config::Config;
use wchain_core::{LedgerService, LedgerSettings, Secp256k1KeyGenerator};
use wchain_node::{NodeState, run_rpc_server};

#[derive(Parser)]
#[command(name = "wchain-node")]
#[command(about = "Single-node wChain ledger with a JSON-RPC interface", long_about = None)]
struct Args {
    /// Configuration file (defaults to ~/.wchain/config.json)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let data_dir = cfg.data_dir_resolved();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    info!("🚀 wChain node starting (data dir {})", data_dir.display());

    let service = LedgerService::open(
        &data_dir,
        LedgerSettings {
            difficulty: cfg.difficulty,
            max_mining_attempts: cfg.max_mining_attempts,
        },
        Box::new(Secp256k1KeyGenerator),
    )
    .context("failed to open ledger")?;

    let addr: SocketAddr = cfg
        .rpc_addr
        .parse()
        .with_context(|| format!("invalid rpc_addr {:?}", cfg.rpc_addr))?;

    let node = Arc::new(NodeState {
        service,
        chain_id: cfg.chain_id,
        mining_timeout: Duration::from_secs(cfg.mining_timeout_secs),
    });

    tokio::select! {
        _ = run_rpc_server(node, addr) => {}
        res = signal::ctrl_c() => {
            res.context("failed to listen for shutdown signal")?;
            info!("Shutdown signal received, stopping node");
        }
    }
    Ok(())
}
