mod commands;

use anyhow::Result;
use clap::Parser;
use commands::*;
use std::path::PathBuf;

use wchain_config::Config;

#[derive(Parser)]
#[command(name = "wchain-cli")]
#[command(about = "wChain node JSON-RPC client", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ~/.wchain/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(Config::default_path);

    if let Commands::Config { subcommand } = &cli.command {
        return match subcommand {
            ConfigCommands::View => {
                let cfg = Config::load_from(&config_path)?;
                println!("{}", cfg.view()?);
                Ok(())
            }
            ConfigCommands::Set { key, value } => {
                let mut cfg = Config::load_from(&config_path)?;
                cfg.set_value(key, value)?;
                cfg.save_to(&config_path)?;
                println!("✅ {} = {} set successfully.", key, value);
                Ok(())
            }
            ConfigCommands::Init => {
                Config::init_default(&config_path)?;
                println!(
                    "Default configuration file has been created: {}",
                    config_path.display()
                );
                Ok(())
            }
        };
    }

    let cfg = Config::load_from(&config_path)?;
    let rpc = RpcClient::new(&cfg)?;

    match cli.command {
        Commands::Balance { address } => get_balance(&rpc, &address),
        Commands::Send { from, to, value } => send_transaction(&rpc, &from, &to, &value),
        Commands::Mine => mine_block(&rpc),
        Commands::Block { number } => get_block(&rpc, &number),
        Commands::Height => get_height(&rpc),
        Commands::AddWallets { count } => add_wallets(&rpc, count),
        Commands::AddBalance { address, amount } => add_balance(&rpc, &address, &amount),
        Commands::Info => info(&rpc),
        Commands::ChainId => chain_id(&rpc),
        Commands::Config { .. } => Ok(()),
    }
}
