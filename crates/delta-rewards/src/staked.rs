//! # Staked Reward Pool
//!
//! Users deposit a stake asset directly and receive shares 1:1. A pool may
//! carry a start timestamp before which staking is closed.

use crate::accumulator::Emission;
use crate::pool::RewardPool;
use delta_core::error::{DeltaError, Operation, Result};
use delta_core::{Address, Amount, Env, Event};
use std::ops::{Deref, DerefMut};
use tracing::info;

#[derive(Clone, Debug)]
pub struct StakedRewardPool {
    pool: RewardPool,
    stake_token: Address,
    start_time: u64,
}

impl StakedRewardPool {
    pub fn new(
        env: &Env,
        address: Address,
        owner: Address,
        stake_token: Address,
        reward_token: Address,
        emission: Emission,
        rate: Amount,
    ) -> Result<Self> {
        Ok(Self {
            pool: RewardPool::new(env, address, owner, reward_token, Some(stake_token), emission, rate)?,
            stake_token,
            start_time: 0,
        })
    }

    /// Keep staking closed until `start_time` (a timestamp)
    pub fn with_start_time(mut self, start_time: u64) -> Self {
        self.start_time = start_time;
        self
    }

    pub fn stake_token(&self) -> Address {
        self.stake_token
    }

    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    /// Pull `amount` stake from `caller` and credit `beneficiary`
    pub fn stake(&mut self, env: &mut Env, caller: Address, beneficiary: Address, amount: Amount) -> Result<()> {
        if amount == 0 {
            return Err(DeltaError::ZeroAmount(Operation::Stake));
        }
        let now = env.clock.timestamp();
        if now < self.start_time {
            return Err(DeltaError::NotStarted { start: self.start_time, now });
        }
        let address = self.pool.address();
        env.assets
            .can_transfer_from(&self.stake_token, &address, &caller, amount)?;

        self.pool.mint_shares(env, &beneficiary, amount)?;
        env.transfer_from(&self.stake_token, &address, &caller, &address, amount)?;

        env.emit(address, Event::Staked { payer: caller, beneficiary, amount });
        info!(pool = %address, payer = %caller, %beneficiary, amount, "staked");
        Ok(())
    }

    /// Burn `amount` of `caller`'s stake and send it to `beneficiary`
    pub fn withdraw(&mut self, env: &mut Env, caller: Address, beneficiary: Address, amount: Amount) -> Result<()> {
        if amount == 0 {
            return Err(DeltaError::ZeroAmount(Operation::Withdraw));
        }
        let address = self.pool.address();

        self.pool.burn_shares(env, &caller, amount)?;
        env.transfer(&self.stake_token, &address, &beneficiary, amount)?;

        env.emit(address, Event::StakeWithdrawn { payer: caller, beneficiary, amount });
        info!(pool = %address, payer = %caller, %beneficiary, amount, "stake withdrawn");
        Ok(())
    }

    /// Withdraw the whole stake and claim, returning (stake, reward)
    pub fn exit(&mut self, env: &mut Env, caller: Address) -> Result<(Amount, Amount)> {
        let stake = self.pool.shares_of(&caller);
        if stake > 0 {
            self.withdraw(env, caller, caller, stake)?;
        }
        let reward = self.pool.claim(env, caller)?;
        Ok((stake, reward))
    }
}

impl Deref for StakedRewardPool {
    type Target = RewardPool;

    fn deref(&self) -> &RewardPool {
        &self.pool
    }
}

impl DerefMut for StakedRewardPool {
    fn deref_mut(&mut self) -> &mut RewardPool {
        &mut self.pool
    }
}
