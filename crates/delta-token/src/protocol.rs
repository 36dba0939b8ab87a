//! # Protocol
//!
//! Transactional facade over a deployed pool token and the pools it routes
//! through. Every mutating call runs inside [`atomic`], so a failure in any
//! leg of a composite call (the withdraw leg of a swap, the reward-share
//! move of a transfer) rolls back every earlier leg too.
//!
//! [`ProtocolHandle`] shares one `Protocol` between threads; calls are
//! fully serialized behind a mutex.

use crate::contracts::Contracts;
use crate::token::{PoolToken, PoolTokenStats};
use delta_core::error::{DeltaError, Result};
use delta_core::{atomic, Address, Amount, Env};
use delta_earning::{EarningPool, EarningPoolStats};
use delta_rewards::RewardPoolStats;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// Snapshot of every component's accounting
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProtocolStats {
    pub timestamp: u64,
    pub block: u64,
    pub token: PoolTokenStats,
    pub earning_pools: Vec<EarningPoolStats>,
    pub reward_pool: RewardPoolStats,
    pub staking_pools: Vec<RewardPoolStats>,
}

#[derive(Clone, Debug)]
pub struct Protocol {
    contracts: Contracts,
    token: PoolToken,
}

impl Protocol {
    pub fn new(contracts: Contracts, token: PoolToken) -> Self {
        Self { contracts, token }
    }

    /// Run `f` as one all-or-nothing call
    pub fn execute<T>(&mut self, f: impl FnOnce(&mut PoolToken, &mut Contracts) -> Result<T>) -> Result<T> {
        atomic(self, |p| f(&mut p.token, &mut p.contracts))
    }

    // === Views ===

    pub fn token(&self) -> &PoolToken {
        &self.token
    }

    pub fn contracts(&self) -> &Contracts {
        &self.contracts
    }

    pub fn env(&self) -> &Env {
        &self.contracts.env
    }

    /// Earning pool routed for `underlying`
    pub fn earning_pool(&self, underlying: &Address) -> Result<&EarningPool> {
        let pool = self
            .token
            .earning_pool_for(underlying)
            .ok_or(DeltaError::UnsupportedUnderlying(*underlying))?;
        self.contracts.earning_pool(&pool)
    }

    /// Mining rewards `account` can claim right now
    pub fn unclaimed_rewards(&self, account: &Address) -> Result<Amount> {
        self.contracts.reward_pool.earned(&self.contracts.env, account)
    }

    pub fn stats(&self) -> Result<ProtocolStats> {
        let env = &self.contracts.env;
        let earning_pools = self
            .token
            .supported_underlyings()
            .iter()
            .map(|u| self.earning_pool(u).and_then(|pool| pool.stats(env)))
            .collect::<Result<Vec<_>>>()?;
        let staking_pools = self
            .contracts
            .staking_pools()
            .map(|pool| pool.stats(env))
            .collect::<Result<Vec<_>>>()?;

        Ok(ProtocolStats {
            timestamp: env.clock.timestamp(),
            block: env.clock.block(),
            token: self.token.stats(),
            earning_pools,
            reward_pool: self.contracts.reward_pool.stats(env)?,
            staking_pools,
        })
    }

    // === Pool token ===

    pub fn mint(&mut self, caller: Address, beneficiary: Address, underlying: Address, amount: Amount) -> Result<Amount> {
        self.execute(|token, c| token.mint(c, caller, beneficiary, underlying, amount))
    }

    pub fn redeem(&mut self, caller: Address, beneficiary: Address, underlying: Address, amount: Amount) -> Result<Amount> {
        self.execute(|token, c| token.redeem(c, caller, beneficiary, underlying, amount))
    }

    pub fn swap(
        &mut self,
        caller: Address,
        beneficiary: Address,
        underlying_from: Address,
        amount_from: Amount,
        underlying_to: Address,
    ) -> Result<Amount> {
        self.execute(|token, c| {
            token.swap(c, caller, beneficiary, underlying_from, amount_from, underlying_to)
        })
    }

    pub fn transfer(&mut self, caller: Address, to: Address, amount: Amount) -> Result<()> {
        self.execute(|token, c| token.transfer(c, caller, to, amount))
    }

    pub fn transfer_from(&mut self, spender: Address, from: Address, to: Address, amount: Amount) -> Result<()> {
        self.execute(|token, c| token.transfer_from(c, spender, from, to, amount))
    }

    pub fn approve(&mut self, caller: Address, spender: Address, amount: Amount) {
        self.token.approve(&mut self.contracts.env, caller, spender, amount);
    }

    /// Deploy `pool` and route its underlying through the token
    pub fn add_earning_pool(&mut self, caller: Address, pool: EarningPool) -> Result<()> {
        self.execute(|token, c| {
            let address = pool.address();
            c.insert_earning_pool(pool)?;
            token.add_earning_pool(c, caller, address)
        })
    }

    pub fn pause(&mut self, caller: Address, underlying: Address) -> Result<()> {
        self.execute(|token, c| token.pause(&mut c.env, caller, underlying))
    }

    pub fn unpause(&mut self, caller: Address, underlying: Address) -> Result<()> {
        self.execute(|token, c| token.unpause(&mut c.env, caller, underlying))
    }

    // === Earning pools ===

    /// Sweep `underlying`'s earning to its recipient
    pub fn dispense_earning(&mut self, underlying: Address) -> Result<Amount> {
        self.with_earning_pool(underlying, |pool, env| pool.dispense_earning(env))
    }

    /// Sweep `underlying`'s venue rewards to its recipient
    pub fn dispense_reward(&mut self, underlying: Address) -> Result<Amount> {
        self.with_earning_pool(underlying, |pool, env| pool.dispense_reward(env))
    }

    /// Run `f` atomically against the earning pool routed for `underlying`
    pub fn with_earning_pool<T>(
        &mut self,
        underlying: Address,
        f: impl FnOnce(&mut EarningPool, &mut Env) -> Result<T>,
    ) -> Result<T> {
        self.execute(|token, c| {
            let pool = token
                .earning_pool_for(&underlying)
                .ok_or(DeltaError::UnsupportedUnderlying(underlying))?;
            let (pool, env) = c.earning_pool_mut(&pool)?;
            f(pool, env)
        })
    }

    // === Rewards ===

    /// Pay `caller` its mined rewards
    pub fn claim_rewards(&mut self, caller: Address) -> Result<Amount> {
        self.execute(|_, c| {
            let (pool, env) = c.reward_pool_mut();
            pool.claim(env, caller)
        })
    }

    pub fn stake(&mut self, pool: Address, caller: Address, beneficiary: Address, amount: Amount) -> Result<()> {
        self.execute(|_, c| {
            let (pool, env) = c.staking_pool_mut(&pool)?;
            pool.stake(env, caller, beneficiary, amount)
        })
    }

    pub fn withdraw_stake(&mut self, pool: Address, caller: Address, beneficiary: Address, amount: Amount) -> Result<()> {
        self.execute(|_, c| {
            let (pool, env) = c.staking_pool_mut(&pool)?;
            pool.withdraw(env, caller, beneficiary, amount)
        })
    }

    pub fn claim_staking_rewards(&mut self, pool: Address, caller: Address) -> Result<Amount> {
        self.execute(|_, c| {
            let (pool, env) = c.staking_pool_mut(&pool)?;
            pool.claim(env, caller)
        })
    }

    /// Withdraw `caller`'s whole stake and claim, returning (stake, reward)
    pub fn exit_staking(&mut self, pool: Address, caller: Address) -> Result<(Amount, Amount)> {
        self.execute(|_, c| {
            let (pool, env) = c.staking_pool_mut(&pool)?;
            pool.exit(env, caller)
        })
    }

    // === Simulation ===

    pub fn advance_time(&mut self, seconds: u64) {
        self.contracts.env.advance_time(seconds);
    }

    pub fn mine(&mut self, blocks: u64, seconds_per_block: u64) {
        self.contracts.env.mine(blocks, seconds_per_block);
    }

    /// Grow the venue behind `underlying` by `multiplier` (1e18 = unchanged)
    pub fn accrue_interest(&mut self, underlying: Address, multiplier: u128) -> Result<()> {
        self.with_earning_pool(underlying, |pool, env| env.accrue_interest(&pool.venue(), multiplier))
    }

    /// Issue `amount` of a registered asset to `to`
    pub fn mint_asset(&mut self, asset: Address, to: Address, amount: Amount) -> Result<()> {
        self.contracts.env.mint_asset(&asset, &to, amount)
    }

    /// Approve `spender` on a registered asset
    pub fn approve_asset(&mut self, asset: Address, owner: Address, spender: Address, amount: Amount) -> Result<()> {
        self.contracts.env.approve(&asset, &owner, &spender, amount)
    }
}

/// Thread-safe, serialized access to one [`Protocol`]
#[derive(Clone, Debug)]
pub struct ProtocolHandle {
    inner: Arc<Mutex<Protocol>>,
}

impl ProtocolHandle {
    pub fn new(protocol: Protocol) -> Self {
        Self {
            inner: Arc::new(Mutex::new(protocol)),
        }
    }

    /// Run `f` with exclusive access
    pub fn with<T>(&self, f: impl FnOnce(&mut Protocol) -> T) -> T {
        f(&mut self.inner.lock())
    }

    pub fn stats(&self) -> Result<ProtocolStats> {
        self.inner.lock().stats()
    }
}
