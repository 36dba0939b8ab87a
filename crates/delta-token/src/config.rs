//! Deployment configuration
//!
//! A deployment file describes the assets, venues, pools and the pool token
//! of one protocol instance. Every contract address is derived from a label,
//! so the same file always deploys to the same addresses.

use crate::contracts::Contracts;
use crate::protocol::Protocol;
use crate::token::PoolToken;
use delta_core::error::{DeltaError, Result};
use delta_core::math::{MANTISSA_ONE, MAX_DECIMALS};
use delta_core::{amount_string, Address, Amount, Clock, Env, SimulatedVenue};
use delta_earning::EarningPool;
use delta_rewards::{Emission, ManagedRewardPool, StakedRewardPool};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Complete deployment description
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Deployment-wide settings
    #[serde(default)]
    pub deployment: DeploymentSettings,

    /// Pool token metadata
    #[serde(default)]
    pub token: TokenConfig,

    /// Mining pool fed by pool-token balances
    #[serde(default)]
    pub reward_pool: RewardPoolConfig,

    /// Fungible assets known to the ledger
    #[serde(default)]
    pub assets: Vec<AssetConfig>,

    /// One earning pool per routed underlying
    #[serde(default)]
    pub earning_pools: Vec<EarningPoolConfig>,

    /// Standalone staking pools
    #[serde(default)]
    pub staking_pools: Vec<StakingPoolConfig>,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            deployment: DeploymentSettings::default(),
            token: TokenConfig::default(),
            reward_pool: RewardPoolConfig::default(),
            assets: vec![
                AssetConfig { symbol: "USDC".to_string(), decimals: 6 },
                AssetConfig { symbol: "DAI".to_string(), decimals: 18 },
                AssetConfig { symbol: "DELT".to_string(), decimals: 18 },
            ],
            earning_pools: vec![
                EarningPoolConfig::for_underlying("USDC"),
                EarningPoolConfig::for_underlying("DAI"),
            ],
            staking_pools: Vec::new(),
        }
    }
}

/// Deployment-wide settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeploymentSettings {
    /// Label or `0x` address of the owner of every contract
    #[serde(default = "default_admin")]
    pub admin: String,

    #[serde(default)]
    pub start_timestamp: u64,

    #[serde(default)]
    pub start_block: u64,
}

fn default_admin() -> String {
    "admin".to_string()
}

impl Default for DeploymentSettings {
    fn default() -> Self {
        Self {
            admin: default_admin(),
            start_timestamp: 0,
            start_block: 0,
        }
    }
}

/// Pool token metadata
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_token_name")]
    pub name: String,

    #[serde(default = "default_token_symbol")]
    pub symbol: String,

    #[serde(default = "default_decimals")]
    pub decimals: u8,
}

fn default_token_name() -> String {
    "Delta USD".to_string()
}

fn default_token_symbol() -> String {
    "dUSD".to_string()
}

fn default_decimals() -> u8 {
    18
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            name: default_token_name(),
            symbol: default_token_symbol(),
            decimals: default_decimals(),
        }
    }
}

/// How a reward pool emits
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmissionMode {
    /// Fixed amount per block
    #[default]
    PerBlock,
    /// Funded periods of `duration_secs`
    Scheduled,
}

/// Reward pool settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RewardPoolConfig {
    /// Symbol of the asset paid out
    #[serde(default = "default_reward_asset")]
    pub reward_asset: String,

    #[serde(default)]
    pub emission: EmissionMode,

    /// Rewards per block; ignored by scheduled emission, which derives its
    /// rate from the funding
    #[serde(
        default = "default_rewards_per_block",
        with = "amount_string",
        alias = "rewards_per_block"
    )]
    pub rate: Amount,

    /// Period length for scheduled emission
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,

    /// Reward asset minted into the pool at deployment
    #[serde(default, with = "amount_string")]
    pub funding: Amount,
}

fn default_reward_asset() -> String {
    "DELT".to_string()
}

fn default_rewards_per_block() -> Amount {
    100 * MANTISSA_ONE
}

fn default_duration_secs() -> u64 {
    7 * 24 * 60 * 60
}

impl Default for RewardPoolConfig {
    fn default() -> Self {
        Self {
            reward_asset: default_reward_asset(),
            emission: EmissionMode::default(),
            rate: default_rewards_per_block(),
            duration_secs: default_duration_secs(),
            funding: 10_000 * MANTISSA_ONE,
        }
    }
}

impl RewardPoolConfig {
    fn emission(&self) -> Emission {
        emission(self.emission, self.duration_secs)
    }
}

/// A fungible asset
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssetConfig {
    pub symbol: String,

    #[serde(default = "default_decimals")]
    pub decimals: u8,
}

/// An earning pool and the simulated venue behind it
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EarningPoolConfig {
    /// Symbol of the routed underlying
    pub underlying: String,

    /// Initial venue exchange rate, scaled by 1e18
    #[serde(default = "default_exchange_rate", with = "amount_string")]
    pub venue_exchange_rate: Amount,

    /// Symbol of the token the venue pays holders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue_reward_asset: Option<String>,

    /// Fraction of each withdrawal retained, scaled by 1e18
    #[serde(default, with = "amount_string")]
    pub withdraw_fee_factor: Amount,

    /// Label or `0x` address receiving earnings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earning_recipient: Option<String>,

    /// Label or `0x` address receiving venue rewards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward_recipient: Option<String>,

    #[serde(default, with = "amount_string")]
    pub earning_dispense_threshold: Amount,

    #[serde(default, with = "amount_string")]
    pub reward_dispense_threshold: Amount,
}

fn default_exchange_rate() -> Amount {
    MANTISSA_ONE
}

impl EarningPoolConfig {
    pub fn for_underlying(symbol: &str) -> Self {
        Self {
            underlying: symbol.to_string(),
            venue_exchange_rate: default_exchange_rate(),
            venue_reward_asset: None,
            withdraw_fee_factor: 0,
            earning_recipient: None,
            reward_recipient: None,
            earning_dispense_threshold: 0,
            reward_dispense_threshold: 0,
        }
    }
}

/// A staking pool paying `reward_asset` for staked `stake_asset`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StakingPoolConfig {
    /// Address label suffix, `staking-pool/<name>`
    pub name: String,

    pub stake_asset: String,

    pub reward_asset: String,

    #[serde(default = "default_staking_emission")]
    pub emission: EmissionMode,

    #[serde(default, with = "amount_string")]
    pub rate: Amount,

    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,

    #[serde(default, with = "amount_string")]
    pub funding: Amount,

    /// Timestamp staking opens at; zero means open from deployment
    #[serde(default)]
    pub start_timestamp: u64,
}

fn default_staking_emission() -> EmissionMode {
    EmissionMode::Scheduled
}

fn emission(mode: EmissionMode, duration_secs: u64) -> Emission {
    match mode {
        EmissionMode::PerBlock => Emission::PerBlock,
        EmissionMode::Scheduled => Emission::Scheduled { duration: duration_secs },
    }
}

// === Address derivation ===

pub fn asset_address(symbol: &str) -> Address {
    Address::from_label(symbol)
}

pub fn venue_address(underlying: &str) -> Address {
    Address::from_label(&format!("venue/{underlying}"))
}

pub fn earning_pool_address(underlying: &str) -> Address {
    Address::from_label(&format!("earning-pool/{underlying}"))
}

pub fn token_address(symbol: &str) -> Address {
    Address::from_label(&format!("token/{symbol}"))
}

pub fn reward_pool_address(token_symbol: &str) -> Address {
    Address::from_label(&format!("reward-pool/{token_symbol}"))
}

pub fn staking_pool_address(name: &str) -> Address {
    Address::from_label(&format!("staking-pool/{name}"))
}

/// Resolve a `0x` hex address or a label
pub fn resolve_account(account: &str) -> Result<Address> {
    if account.starts_with("0x") {
        Address::from_hex(account)
            .map_err(|e| DeltaError::Config(format!("invalid address {account:?}: {e}")))
    } else {
        Ok(Address::from_label(account))
    }
}

impl DeploymentConfig {
    /// Parse a TOML deployment
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| DeltaError::Config(e.to_string()))
    }

    /// Load a TOML deployment file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DeltaError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Save as TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| DeltaError::Config(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| DeltaError::Config(format!("cannot write {}: {e}", path.display())))
    }

    pub fn admin(&self) -> Result<Address> {
        resolve_account(&self.deployment.admin)
    }

    /// Reject configurations that cannot deploy
    pub fn validate(&self) -> Result<()> {
        let reject = |msg: String| Err(DeltaError::Config(msg));

        if self.token.name.is_empty() || self.token.symbol.is_empty() {
            return reject("token name and symbol must be set".to_string());
        }
        if self.token.decimals > MAX_DECIMALS {
            return reject(format!("token decimals {} exceed {MAX_DECIMALS}", self.token.decimals));
        }
        self.admin()?;

        let mut symbols = HashSet::new();
        for asset in &self.assets {
            if !symbols.insert(asset.symbol.as_str()) {
                return reject(format!("duplicate asset {}", asset.symbol));
            }
            if asset.decimals > MAX_DECIMALS {
                return reject(format!("asset {} decimals {} exceed {MAX_DECIMALS}", asset.symbol, asset.decimals));
            }
        }
        let known = |symbol: &str| -> Result<()> {
            if symbols.contains(symbol) {
                Ok(())
            } else {
                Err(DeltaError::Config(format!("unknown asset {symbol}")))
            }
        };

        known(&self.reward_pool.reward_asset)?;
        if self.reward_pool.emission == EmissionMode::Scheduled && self.reward_pool.duration_secs == 0 {
            return reject("reward pool duration must be non-zero".to_string());
        }

        let mut routed = HashSet::new();
        for pool in &self.earning_pools {
            known(&pool.underlying)?;
            if !routed.insert(pool.underlying.as_str()) {
                return reject(format!("duplicate earning pool for {}", pool.underlying));
            }
            if let Some(asset) = &pool.venue_reward_asset {
                known(asset)?;
            }
            if pool.venue_exchange_rate == 0 {
                return reject(format!("venue exchange rate for {} must be non-zero", pool.underlying));
            }
            if pool.withdraw_fee_factor >= MANTISSA_ONE {
                return reject(format!(
                    "withdraw fee factor for {} must be less than 1e18",
                    pool.underlying
                ));
            }
            for recipient in [&pool.earning_recipient, &pool.reward_recipient].into_iter().flatten() {
                resolve_account(recipient)?;
            }
        }

        let mut names = HashSet::new();
        for pool in &self.staking_pools {
            if !names.insert(pool.name.as_str()) {
                return reject(format!("duplicate staking pool {}", pool.name));
            }
            known(&pool.stake_asset)?;
            known(&pool.reward_asset)?;
            if pool.emission == EmissionMode::Scheduled && pool.duration_secs == 0 {
                return reject(format!("staking pool {} duration must be non-zero", pool.name));
            }
        }
        Ok(())
    }

    /// Deploy into a fresh environment
    pub fn deploy(&self) -> Result<Protocol> {
        self.validate()?;
        let admin = self.admin()?;

        let mut env = Env::new(Clock::new(
            self.deployment.start_timestamp,
            self.deployment.start_block,
        ));
        for asset in &self.assets {
            env.assets
                .register(asset_address(&asset.symbol), asset.symbol.clone(), asset.decimals)?;
        }

        let reward_pool = ManagedRewardPool::new(
            &env,
            reward_pool_address(&self.token.symbol),
            admin,
            asset_address(&self.reward_pool.reward_asset),
            self.reward_pool.emission(),
            self.reward_pool.rate,
        )?;
        let mut contracts = Contracts::new(env, reward_pool);

        let mut routed = Vec::with_capacity(self.earning_pools.len());
        for config in &self.earning_pools {
            routed.push(deploy_earning_pool(&mut contracts, config, admin)?);
        }
        for config in &self.staking_pools {
            deploy_staking_pool(&mut contracts, config, admin)?;
        }

        let token = PoolToken::new(
            &mut contracts,
            token_address(&self.token.symbol),
            admin,
            self.token.name.clone(),
            self.token.symbol.clone(),
            self.token.decimals,
            &routed,
        )?;

        let (reward_pool, env) = contracts.reward_pool_mut();
        reward_pool.promote(env, admin, token.address())?;
        let funding = self.reward_pool.funding;
        if funding > 0 {
            let (address, asset) = (reward_pool.address(), reward_pool.reward_token());
            env.mint_asset(&asset, &address, funding)?;
            if self.reward_pool.emission == EmissionMode::Scheduled {
                reward_pool.notify_reward_amount(env, admin, funding)?;
            }
        }

        info!(
            token = %token.address(),
            earning_pools = routed.len(),
            staking_pools = self.staking_pools.len(),
            "protocol deployed"
        );
        Ok(Protocol::new(contracts, token))
    }
}

fn deploy_earning_pool(contracts: &mut Contracts, config: &EarningPoolConfig, admin: Address) -> Result<Address> {
    let underlying = asset_address(&config.underlying);
    let venue_addr = venue_address(&config.underlying);
    let address = earning_pool_address(&config.underlying);

    let mut venue = SimulatedVenue::new(venue_addr, underlying, config.venue_exchange_rate)?;
    if let Some(asset) = &config.venue_reward_asset {
        venue = venue.with_reward_token(asset_address(asset));
    }
    let env = &mut contracts.env;
    env.add_venue(Box::new(venue))?;

    let mut pool = EarningPool::new(env, address, admin, venue_addr, None)?;
    if config.withdraw_fee_factor > 0 {
        pool.set_withdraw_fee_factor(env, admin, config.withdraw_fee_factor)?;
    }
    if let Some(recipient) = &config.earning_recipient {
        pool.set_earning_recipient(env, admin, Some(resolve_account(recipient)?))?;
    }
    if let Some(recipient) = &config.reward_recipient {
        pool.set_reward_recipient(env, admin, Some(resolve_account(recipient)?))?;
    }
    if config.earning_dispense_threshold > 0 {
        pool.set_earning_dispense_threshold(env, admin, config.earning_dispense_threshold)?;
    }
    if config.reward_dispense_threshold > 0 {
        pool.set_reward_dispense_threshold(env, admin, config.reward_dispense_threshold)?;
    }

    contracts.insert_earning_pool(pool)?;
    Ok(address)
}

fn deploy_staking_pool(contracts: &mut Contracts, config: &StakingPoolConfig, admin: Address) -> Result<()> {
    let env = &mut contracts.env;
    let mut pool = StakedRewardPool::new(
        env,
        staking_pool_address(&config.name),
        admin,
        asset_address(&config.stake_asset),
        asset_address(&config.reward_asset),
        emission(config.emission, config.duration_secs),
        config.rate,
    )?
    .with_start_time(config.start_timestamp);
    if config.funding > 0 {
        env.mint_asset(&pool.reward_token(), &pool.address(), config.funding)?;
        if config.emission == EmissionMode::Scheduled {
            pool.notify_reward_amount(env, admin, config.funding)?;
        }
    }
    contracts.insert_staking_pool(pool)
}
