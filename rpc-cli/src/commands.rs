use anyhow::{Context, Result, anyhow, bail};
use primitive_types::U256;
use reqwest::blocking::Client;
use serde_json::{Value, json};
use std::time::Duration;
use wchain_config::Config;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Show the balance of an address (Wa...)
    Balance { address: String },

    /// Transfer funds between two node-managed wallets
    Send {
        from: String,
        to: String,
        #[arg(help = "Amount as decimal or 0x-prefixed hex")]
        value: String,
    },

    /// Mine the pending transactions into a new block
    Mine,

    /// Fetch a block by index (decimal, 0x hex, latest or earliest)
    Block { number: String },

    /// Current chain height
    Height,

    /// Create zero-balance wallets on the node
    AddWallets { count: u64 },

    /// Credit an address
    AddBalance {
        address: String,
        #[arg(help = "Amount as decimal or 0x-prefixed hex")]
        amount: String,
    },

    /// List every wallet with its balance
    Info,

    /// Chain id reported by the node
    ChainId,

    /// Manage CLI configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
pub enum ConfigCommands {
    View,
    Set { key: String, value: String },
    Init,
}

pub struct RpcClient {
    client: Client,
    url: String,
}

impl RpcClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout(cfg))
            .build()
            .context("failed to build HTTP client")?;
        Ok(RpcClient {
            client,
            url: cfg.node_rpc_url.clone(),
        })
    }

    pub fn call(&self, method: &str, params: Value) -> Result<Value> {
        log::debug!("-> {} {}", method, params);
        let response: Value = self
            .client
            .post(&self.url)
            .json(&build_request(method, params))
            .send()
            .with_context(|| format!("request to {} failed", self.url))?
            .json()
            .context("node returned a non-JSON response")?;
        into_result(response)
    }
}

/// Mining requests may run up to the node's own timeout.
pub fn request_timeout(cfg: &Config) -> Duration {
    Duration::from_secs(cfg.mining_timeout_secs.saturating_add(30))
}

pub fn build_request(method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    })
}

/// Unwrap a JSON-RPC response into its result, or an error naming the kind.
pub fn into_result(mut response: Value) -> Result<Value> {
    if let Some(error) = response.get("error") {
        let message = error["message"].as_str().unwrap_or("unknown error");
        return match error["data"]["kind"].as_str() {
            Some(kind) => Err(anyhow!("{}: {}", kind, message)),
            None => Err(anyhow!("RPC error {}: {}", error["code"], message)),
        };
    }
    match response.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => bail!("response has neither result nor error"),
    }
}

/// `0x` hex quantity rendered in decimal.
pub fn hex_to_decimal(hex: &str) -> Result<String> {
    let digits = hex
        .strip_prefix("0x")
        .ok_or_else(|| anyhow!("expected a 0x quantity, got {}", hex))?;
    let value = U256::from_str_radix(digits, 16)
        .map_err(|e| anyhow!("invalid hex quantity {}: {:?}", hex, e))?;
    Ok(value.to_string())
}

/// Block selectors typed as decimal are sent as hex.
pub fn block_selector(number: &str) -> Result<String> {
    match number {
        "latest" | "earliest" => Ok(number.to_string()),
        n if n.starts_with("0x") => Ok(n.to_string()),
        n => {
            let index: u64 = n
                .parse()
                .with_context(|| format!("invalid block number {}", n))?;
            Ok(format!("0x{:x}", index))
        }
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn get_balance(rpc: &RpcClient, address: &str) -> Result<()> {
    let result = rpc.call("wcn_getBalance", json!([address]))?;
    let hex = result.as_str().unwrap_or_default();
    println!("💰 Balance of {}: {} WCN ({})", address, hex_to_decimal(hex)?, hex);
    Ok(())
}

pub fn send_transaction(rpc: &RpcClient, from: &str, to: &str, value: &str) -> Result<()> {
    let result = rpc.call(
        "wcn_sendTransaction",
        json!([{ "from": from, "to": to, "value": value }]),
    )?;
    println!("✅ {}", result.as_str().unwrap_or("Transaction submitted"));
    Ok(())
}

pub fn mine_block(rpc: &RpcClient) -> Result<()> {
    let block = rpc.call("wcn_mineBlock", json!([]))?;
    println!(
        "⛏️  Mined block {} with {} transactions",
        block["index"],
        block["transactions"].as_array().map(Vec::len).unwrap_or(0)
    );
    print_json(&block)
}

pub fn get_block(rpc: &RpcClient, number: &str) -> Result<()> {
    let block = rpc.call("wcn_getBlockByNumber", json!([block_selector(number)?]))?;
    print_json(&block)
}

pub fn get_height(rpc: &RpcClient) -> Result<()> {
    let result = rpc.call("wcn_blockNumber", json!([]))?;
    println!("📊 Chain height: {}", hex_to_decimal(result.as_str().unwrap_or_default())?);
    Ok(())
}

pub fn add_wallets(rpc: &RpcClient, count: u64) -> Result<()> {
    let created = rpc.call("addWallets", json!([count]))?;
    println!("✅ {} wallets added", created);
    Ok(())
}

pub fn add_balance(rpc: &RpcClient, address: &str, amount: &str) -> Result<()> {
    let result = rpc.call("addBalance", json!([address, amount]))?;
    println!("✅ {}", result.as_str().unwrap_or("Balance added"));
    Ok(())
}

pub fn info(rpc: &RpcClient) -> Result<()> {
    let wallets = rpc.call("info", json!([]))?;
    let wallets = wallets.as_array().cloned().unwrap_or_default();
    if wallets.is_empty() {
        println!("No wallets on the node yet.");
        return Ok(());
    }
    for wallet in &wallets {
        println!(
            "{}  {}",
            wallet["address"].as_str().unwrap_or("?"),
            wallet["balance"].as_str().unwrap_or("?")
        );
    }
    Ok(())
}

pub fn chain_id(rpc: &RpcClient) -> Result<()> {
    let result = rpc.call("wcn_chainId", json!([]))?;
    let hex = result.as_str().unwrap_or_default();
    println!("Chain ID: {} ({})", hex_to_decimal(hex)?, hex);
    Ok(())
}
