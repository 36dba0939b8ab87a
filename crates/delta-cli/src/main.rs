//! Delta CLI
//!
//! Command-line interface for deploying and exercising Delta protocol
//! instances described by a TOML deployment file.

use anyhow::Context;
use clap::{Parser, Subcommand};
use delta_core::math::MANTISSA_ONE;
use delta_core::{Address, Amount, UNLIMITED_ALLOWANCE};
use delta_token::config::{asset_address, resolve_account};
use delta_token::{DeploymentConfig, Protocol};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "delta")]
#[command(version)]
#[command(about = "Delta - multi-asset stable-value ledger over yield venues", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true, env = "DELTA_LOG_JSON")]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default deployment file
    Init {
        /// Output file
        #[arg(short, long, default_value = "delta.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Check a deployment file and print it with defaults filled in
    Validate {
        /// Deployment file
        #[arg(short, long, default_value = "delta.toml", env = "DELTA_CONFIG")]
        config: PathBuf,
    },

    /// Deploy and print the initial protocol state
    Stats {
        /// Deployment file
        #[arg(short, long, default_value = "delta.toml", env = "DELTA_CONFIG")]
        config: PathBuf,

        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Deploy, then run one user through mint, mining, interest and redeem
    Simulate {
        /// Deployment file
        #[arg(short, long, default_value = "delta.toml", env = "DELTA_CONFIG")]
        config: PathBuf,

        /// Label or 0x address of the simulated user
        #[arg(long, default_value = "alice")]
        account: String,

        /// Symbol of the underlying to deposit
        #[arg(short, long, default_value = "USDC")]
        underlying: String,

        /// Deposit in base units of the underlying
        #[arg(short, long, default_value = "1000000000")]
        amount: Amount,

        /// Blocks to mine while deposited
        #[arg(short, long, default_value = "10")]
        blocks: u64,

        /// Seconds per mined block
        #[arg(long, default_value = "13")]
        block_time: u64,

        /// Venue interest accrued while deposited, in basis points
        #[arg(short, long, default_value = "100")]
        interest_bps: u32,

        /// Print the final state as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: bool, json: bool) {
    let env_filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false))
            .init();
    }
}

fn load(path: &Path) -> anyhow::Result<DeploymentConfig> {
    DeploymentConfig::load(path).with_context(|| format!("loading {}", path.display()))
}

fn deploy(path: &Path) -> anyhow::Result<Protocol> {
    let config = load(path)?;
    config.deploy().with_context(|| format!("deploying {}", path.display()))
}

fn print_summary(protocol: &Protocol) -> anyhow::Result<()> {
    let stats = protocol.stats()?;
    let env = protocol.env();
    let symbol = |asset: &Address| {
        env.assets
            .get(asset)
            .map(|a| a.symbol.clone())
            .unwrap_or_else(|_| asset.to_string())
    };

    println!("Block {} at t={}", stats.block, stats.timestamp);
    println!();
    println!("{} ({}) at {}", stats.token.name, stats.token.symbol, stats.token.address);
    println!("  Decimals:     {}", stats.token.decimals);
    println!("  Total supply: {}", stats.token.total_supply);
    for paused in &stats.token.paused {
        println!("  Paused:       {}", symbol(paused));
    }
    println!();
    println!("Earning pools:");
    for pool in &stats.earning_pools {
        println!("  {} at {}", symbol(&pool.underlying), pool.address);
        println!("    Shares:              {}", pool.total_shares);
        println!("    Pool value:          {}", pool.pool_value);
        println!("    Undispensed earning: {}", pool.undispensed_earning);
        println!("    Undispensed reward:  {}", pool.undispensed_reward);
        println!("    Withdraw fee factor: {}", pool.withdraw_fee_factor);
    }
    println!();
    let reward = &stats.reward_pool;
    println!("Reward pool at {} paying {}", reward.address, symbol(&reward.reward_token));
    println!("  Emission:      {:?} at {}", reward.emission, reward.rate);
    println!("  Shares:        {}", reward.total_shares);
    println!("  Emitted:       {}", reward.total_emitted);
    println!("  Balance:       {}", reward.reward_balance);
    for pool in &stats.staking_pools {
        println!();
        println!("Staking pool at {} paying {}", pool.address, symbol(&pool.reward_token));
        println!("  Emission:      {:?} at {}", pool.emission, pool.rate);
        println!("  Staked:        {}", pool.total_shares);
        println!("  Balance:       {}", pool.reward_balance);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn simulate(
    protocol: &mut Protocol,
    account: Address,
    underlying: Address,
    amount: Amount,
    blocks: u64,
    block_time: u64,
    interest_bps: u32,
) -> anyhow::Result<()> {
    let token = protocol.token().address();
    protocol.mint_asset(underlying, account, amount)?;
    protocol.approve_asset(underlying, account, token, UNLIMITED_ALLOWANCE)?;

    let minted = protocol.mint(account, account, underlying, amount)?;
    tracing::info!(%account, amount, minted, "minted");

    protocol.mine(blocks, block_time);
    let multiplier = MANTISSA_ONE + Amount::from(interest_bps) * (MANTISSA_ONE / 10_000);
    protocol.accrue_interest(underlying, multiplier)?;

    let rewards = protocol.claim_rewards(account)?;
    let received = protocol.redeem(account, account, underlying, amount)?;
    let earning = protocol.dispense_earning(underlying)?;

    println!("Minted:           {minted}");
    println!("Rewards claimed:  {rewards}");
    println!("Redeemed:         {received}");
    println!("Earning dispensed: {earning}");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    match cli.command {
        Commands::Init { output, force } => {
            if output.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", output.display());
            }
            DeploymentConfig::default().save(&output)?;
            println!("Deployment written to {}", output.display());
        }

        Commands::Validate { config } => {
            let deployment = load(&config)?;
            deployment.validate()?;
            print!("{}", toml::to_string_pretty(&deployment)?);
        }

        Commands::Stats { config, json } => {
            let protocol = deploy(&config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&protocol.stats()?)?);
            } else {
                print_summary(&protocol)?;
            }
        }

        Commands::Simulate {
            config,
            account,
            underlying,
            amount,
            blocks,
            block_time,
            interest_bps,
            json,
        } => {
            let mut protocol = deploy(&config)?;
            let account = resolve_account(&account)?;
            let underlying = asset_address(&underlying);

            simulate(&mut protocol, account, underlying, amount, blocks, block_time, interest_bps)?;
            println!();
            if json {
                println!("{}", serde_json::to_string_pretty(&protocol.stats()?)?);
            } else {
                print_summary(&protocol)?;
            }
        }
    }

    Ok(())
}
