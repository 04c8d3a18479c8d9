//! # Ledger Node
//!
//! Operator commands for one node. Configuration comes from `LN_*`
//! environment variables (see [`NodeConfig`]).
//!
//! ```text
//! node-runtime genesis <source> [--force] [--extra-account <account>]
//! node-runtime sync [--peer <address>]
//! ```

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shared_types::AccountNumber;
use tracing::{error, info};

use node_runtime::genesis::{self, GenesisError, GenesisOptions, DEFAULT_EXTRA_ACCOUNT_BALANCE};
use node_runtime::telemetry::{init_tracing, DEFAULT_LOG_LEVEL};
use node_runtime::{LedgerNode, NodeConfig};

/// Permissioned ledger node
#[derive(Parser, Debug)]
#[command(name = "node-runtime")]
#[command(about = "Operator commands for a ledger node")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the genesis block
    Genesis {
        /// File path or URL of the alpha account root file
        source: String,

        /// Remove the existing blockchain if any
        #[arg(short, long)]
        force: bool,

        /// Account to fund in addition to the root file
        #[arg(short, long, value_parser = parse_account)]
        extra_account: Option<AccountNumber>,

        /// Balance of the extra account
        #[arg(long, default_value_t = DEFAULT_EXTRA_ACCOUNT_BALANCE)]
        extra_account_balance: u64,
    },

    /// Download and apply the blocks this node is missing
    Sync {
        /// Base address of one peer; the registered nodes are tried otherwise
        #[arg(long)]
        peer: Option<String>,
    },
}

fn parse_account(value: &str) -> Result<AccountNumber, String> {
    value.to_lowercase().parse().map_err(|err| format!("{err}"))
}

async fn run_genesis(
    config: NodeConfig,
    source: &str,
    options: GenesisOptions,
) -> Result<()> {
    let node = LedgerNode::open(config)?;
    if node.ledger().last_block_number()?.is_some() && !options.force {
        return Err(GenesisError::AlreadyExists.into());
    }

    let accounts = genesis::read_source(source, node.config().request_timeout).await?;
    info!("Read {} accounts from {}", accounts.len(), source);
    let block = genesis::create_genesis(node.ledger(), node.config(), accounts, &options)?;
    info!("Genesis block {} stored", block.make_hash()?);
    Ok(())
}

async fn run_sync(config: NodeConfig, peer: Option<String>) -> Result<()> {
    let node = LedgerNode::open(config)?;
    let report = match peer {
        Some(address) => node.peers().sync_with_address(&address).await?,
        None => node.sync().await?,
    };
    if let Some(err) = &report.error {
        error!(
            "Sync from {} stopped at block {}: {}",
            report.address, report.next_block_number, err
        );
    }
    info!(
        "Applied {} blocks, next block is {}",
        report.applied, report.next_block_number
    );
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = NodeConfig::from_env().context("Invalid node configuration")?;
    match cli.command {
        Command::Genesis {
            source,
            force,
            extra_account,
            extra_account_balance,
        } => {
            let options = GenesisOptions {
                force,
                extra_account,
                extra_account_balance,
            };
            run_genesis(config, &source, options).await
        }
        Command::Sync { peer } => run_sync(config, peer).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_tracing(DEFAULT_LOG_LEVEL) {
        eprintln!("Failed to initialize logging: {err}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}
