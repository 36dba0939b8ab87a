//! Reward pool state shared by the managed and staked variants
//!
//! Wraps a [`RewardAccumulator`] with the pool's address, its reward token
//! and its owner, and reads the checkpoint and reward balance from [`Env`].

use crate::accumulator::{Emission, RewardAccumulator};
use delta_core::error::{DeltaError, Result};
use delta_core::math::U256;
use delta_core::{Address, Amount, Env, Event, Ownable};
use serde::Serialize;
use tracing::info;

/// Point-in-time view of a reward pool
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RewardPoolStats {
    pub address: Address,
    pub reward_token: Address,
    pub emission: Emission,
    #[serde(with = "delta_core::amount_string")]
    pub rate: Amount,
    #[serde(with = "delta_core::amount_string")]
    pub total_shares: Amount,
    #[serde(with = "delta_core::amount_string")]
    pub total_emitted: Amount,
    #[serde(with = "delta_core::amount_string")]
    pub reward_balance: Amount,
}

#[derive(Clone, Debug)]
pub struct RewardPool {
    address: Address,
    reward_token: Address,
    /// Staked asset, excluded from the reward balance when it is the reward token
    stake_token: Option<Address>,
    ownable: Ownable,
    accumulator: RewardAccumulator,
}

impl RewardPool {
    pub fn new(
        env: &Env,
        address: Address,
        owner: Address,
        reward_token: Address,
        stake_token: Option<Address>,
        emission: Emission,
        rate: Amount,
    ) -> Result<Self> {
        env.assets.get(&reward_token)?;
        if let Some(token) = stake_token {
            env.assets.get(&token)?;
        }
        if let Emission::Scheduled { duration: 0 } = emission {
            return Err(DeltaError::InvalidParameter(
                "reward duration must be non-zero".to_string(),
            ));
        }

        Ok(Self {
            address,
            reward_token,
            stake_token,
            ownable: Ownable::new(owner),
            accumulator: RewardAccumulator::new(emission, rate, emission.checkpoint(&env.clock)),
        })
    }

    // === Views ===

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn reward_token(&self) -> Address {
        self.reward_token
    }

    pub fn owner(&self) -> Address {
        self.ownable.owner()
    }

    pub fn accumulator(&self) -> &RewardAccumulator {
        &self.accumulator
    }

    pub fn shares_of(&self, account: &Address) -> Amount {
        self.accumulator.shares_of(account)
    }

    pub fn total_shares(&self) -> Amount {
        self.accumulator.total_shares()
    }

    pub fn now(&self, env: &Env) -> u64 {
        self.accumulator.emission().checkpoint(&env.clock)
    }

    /// Reward tokens held for distribution
    pub fn reward_balance(&self, env: &Env) -> Amount {
        let held = env.balance_of(&self.reward_token, &self.address);
        match self.stake_token {
            Some(stake) if stake == self.reward_token => held.saturating_sub(self.total_shares()),
            _ => held,
        }
    }

    pub fn earned(&self, env: &Env, account: &Address) -> Result<Amount> {
        self.accumulator
            .earned(account, self.now(env), self.reward_balance(env))
    }

    pub fn reward_per_share(&self, env: &Env) -> Result<U256> {
        self.accumulator
            .reward_per_share(self.now(env), self.reward_balance(env))
    }

    pub fn total_rewards_emitted(&self, env: &Env) -> Result<Amount> {
        self.accumulator
            .total_emitted(self.now(env), self.reward_balance(env))
    }

    pub fn stats(&self, env: &Env) -> Result<RewardPoolStats> {
        Ok(RewardPoolStats {
            address: self.address,
            reward_token: self.reward_token,
            emission: self.accumulator.emission(),
            rate: self.accumulator.rate(),
            total_shares: self.total_shares(),
            total_emitted: self.total_rewards_emitted(env)?,
            reward_balance: self.reward_balance(env),
        })
    }

    // === Shares ===

    pub(crate) fn mint_shares(&mut self, env: &Env, account: &Address, amount: Amount) -> Result<()> {
        let (now, balance) = (self.now(env), self.reward_balance(env));
        self.accumulator.mint_shares(account, amount, now, balance)
    }

    pub(crate) fn burn_shares(&mut self, env: &Env, account: &Address, amount: Amount) -> Result<()> {
        let (now, balance) = (self.now(env), self.reward_balance(env));
        self.accumulator.burn_shares(account, amount, now, balance)
    }

    // === Rewards ===

    /// Pay `caller` everything it has earned; zero is not an error
    pub fn claim(&mut self, env: &mut Env, caller: Address) -> Result<Amount> {
        let (now, balance) = (self.now(env), self.reward_balance(env));
        let reward = self.accumulator.take_reward(&caller, now, balance)?;
        if reward == 0 {
            return Ok(0);
        }

        env.transfer(&self.reward_token, &self.address, &caller, reward)?;
        env.emit(self.address, Event::RewardPaid { account: caller, amount: reward });
        info!(pool = %self.address, account = %caller, amount = reward, "reward claimed");
        Ok(reward)
    }

    /// Fund a new period with `amount` reward tokens already sent to the pool
    ///
    /// Zero restarts the period, spreading what is still unvested over a
    /// fresh duration.
    pub fn notify_reward_amount(&mut self, env: &mut Env, caller: Address, amount: Amount) -> Result<()> {
        self.ownable.ensure_owner(&caller)?;
        let (now, balance) = (self.now(env), self.reward_balance(env));
        self.accumulator.notify(amount, now, balance)?;

        let (rate, period_finish) = (self.accumulator.rate(), self.accumulator.period_finish());
        env.emit(self.address, Event::RewardAdded { amount, rate, period_finish });
        info!(pool = %self.address, amount, rate, period_finish, "reward period funded");
        Ok(())
    }

    pub fn set_rewards_per_block(&mut self, env: &mut Env, caller: Address, rate: Amount) -> Result<()> {
        if self.accumulator.emission() != Emission::PerBlock {
            return Err(DeltaError::EmissionMismatch("set_rewards_per_block"));
        }
        self.set_rate(env, caller, rate)
    }

    pub fn set_rewards_per_second(&mut self, env: &mut Env, caller: Address, rate: Amount) -> Result<()> {
        if self.accumulator.emission() == Emission::PerBlock {
            return Err(DeltaError::EmissionMismatch("set_rewards_per_second"));
        }
        self.set_rate(env, caller, rate)
    }

    fn set_rate(&mut self, env: &mut Env, caller: Address, rate: Amount) -> Result<()> {
        self.ownable.ensure_owner(&caller)?;
        let (now, balance) = (self.now(env), self.reward_balance(env));
        let old = self.accumulator.set_rate(rate, now, balance)?;
        env.emit(self.address, Event::RewardRateChanged { old, new: rate });
        info!(pool = %self.address, old, new = rate, "reward rate changed");
        Ok(())
    }

    /// Send the owner every reward token not allocated or scheduled
    pub fn withdraw_remaining_rewards(&mut self, env: &mut Env, caller: Address) -> Result<Amount> {
        self.ownable.ensure_owner(&caller)?;
        let (now, balance) = (self.now(env), self.reward_balance(env));
        let amount = self.accumulator.sweepable(now, balance)?;
        if amount == 0 {
            return Ok(0);
        }

        env.transfer(&self.reward_token, &self.address, &caller, amount)?;
        env.emit(self.address, Event::RemainingRewardsWithdrawn { recipient: caller, amount });
        info!(pool = %self.address, recipient = %caller, amount, "remaining rewards withdrawn");
        Ok(amount)
    }

    pub fn transfer_ownership(&mut self, env: &mut Env, caller: Address, new_owner: Address) -> Result<()> {
        let previous = self.ownable.transfer_ownership(&caller, new_owner)?;
        env.emit(self.address, Event::OwnershipTransferred { previous, new: new_owner });
        Ok(())
    }

    pub(crate) fn ensure_owner(&self, caller: &Address) -> Result<()> {
        self.ownable.ensure_owner(caller)
    }
}
