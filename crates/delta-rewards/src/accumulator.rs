//! # Reward Accumulator
//!
//! Time-weighted, share-proportional reward accounting.
//!
//! A global `reward_per_share` (scaled by 1e18 regardless of the reward
//! token's decimals) grows by `emission * 1e18 / total_shares` at every
//! update. Each account remembers the value it was last settled at, so
//!
//! ```text
//! earned(a) = accrued[a] + shares[a] * (reward_per_share - paid[a]) / 1e18
//! ```
//!
//! Shares must never change without settling the account first.
//!
//! Emission since the checkpoint is `rate * elapsed`, capped by the part of
//! the pool's reward balance not yet allocated to holders. While there are
//! no shares the checkpoint stays put, so whatever was scheduled for the idle
//! window is credited to the first holders once shares appear. A rate change
//! during such a window banks the idle emission at the old rate first.
//!
//! The accumulator is pure bookkeeping: the caller passes the current
//! checkpoint (timestamp or block) and the pool's reward balance.

use delta_core::error::{DeltaError, Result};
use delta_core::math::{checked_add, narrow, MANTISSA_ONE, U256};
use delta_core::{Address, Amount, Clock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// How rewards are released over time
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Emission {
    /// Per-second rate set by funding a period of `duration` seconds
    Scheduled { duration: u64 },
    /// Fixed amount per block, open-ended
    PerBlock,
}

impl Emission {
    /// Checkpoint this mode measures elapsed time in
    pub fn checkpoint(&self, clock: &Clock) -> u64 {
        match self {
            Self::Scheduled { .. } => clock.timestamp(),
            Self::PerBlock => clock.block(),
        }
    }
}

/// Shares ledger plus the reward-per-share accumulator
#[derive(Clone, Debug)]
pub struct RewardAccumulator {
    emission: Emission,

    /// Reward per second or per block
    rate: Amount,

    /// End of the funded period (scheduled emission only)
    period_finish: u64,

    /// Checkpoint of the last accumulator update
    last_update: u64,

    reward_per_share: U256,

    shares: HashMap<Address, Amount>,
    total_shares: Amount,

    /// Accumulator value each account was last settled at
    paid: HashMap<Address, U256>,

    /// Settled, unclaimed rewards
    accrued: HashMap<Address, Amount>,

    /// Idle-window emission banked for the first holders
    carried: Amount,

    total_emitted: Amount,
    total_claimed: Amount,
}

impl RewardAccumulator {
    pub fn new(emission: Emission, rate: Amount, now: u64) -> Self {
        Self {
            emission,
            rate,
            period_finish: now,
            last_update: now,
            reward_per_share: U256::zero(),
            shares: HashMap::new(),
            total_shares: 0,
            paid: HashMap::new(),
            accrued: HashMap::new(),
            carried: 0,
            total_emitted: 0,
            total_claimed: 0,
        }
    }

    // === Views ===

    pub fn emission(&self) -> Emission {
        self.emission
    }

    pub fn rate(&self) -> Amount {
        self.rate
    }

    pub fn period_finish(&self) -> u64 {
        self.period_finish
    }

    pub fn last_update(&self) -> u64 {
        self.last_update
    }

    pub fn shares_of(&self, account: &Address) -> Amount {
        self.shares.get(account).copied().unwrap_or(0)
    }

    pub fn total_shares(&self) -> Amount {
        self.total_shares
    }

    /// Accumulator value as of the last update
    pub fn reward_per_share_stored(&self) -> U256 {
        self.reward_per_share
    }

    /// Emitted but not yet claimed
    pub fn outstanding(&self) -> Amount {
        self.total_emitted.saturating_sub(self.total_claimed)
    }

    /// Part of `balance` not yet allocated to holders
    pub fn unallocated(&self, balance: Amount) -> Amount {
        balance.saturating_sub(self.outstanding())
    }

    /// Idle-window emission waiting for the first holders
    pub fn carried(&self) -> Amount {
        self.carried
    }

    /// Scheduled but not yet emitted (scheduled emission only)
    pub fn unvested(&self) -> Amount {
        match self.emission {
            Emission::Scheduled { .. } if self.period_finish > self.last_update => self
                .rate
                .saturating_mul((self.period_finish - self.last_update) as u128),
            _ => 0,
        }
    }

    /// Rate-bearing checkpoints between the last update and `now`
    fn elapsed(&self, now: u64) -> u128 {
        let end = match self.emission {
            Emission::Scheduled { .. } => now.min(self.period_finish),
            Emission::PerBlock => now,
        };
        end.saturating_sub(self.last_update) as u128
    }

    /// Emission owed since the checkpoint plus anything carried, capped at
    /// the unallocated balance
    fn pending_emission(&self, now: u64, balance: Amount) -> Amount {
        if self.total_shares == 0 {
            return 0;
        }
        self.rate
            .saturating_mul(self.elapsed(now))
            .saturating_add(self.carried)
            .min(self.unallocated(balance))
    }

    /// Accumulator value as of `now`
    pub fn reward_per_share(&self, now: u64, balance: Amount) -> Result<U256> {
        let emission = self.pending_emission(now, balance);
        if emission == 0 {
            return Ok(self.reward_per_share);
        }
        let increment = U256::from(emission) * U256::from(MANTISSA_ONE) / U256::from(self.total_shares);
        self.reward_per_share
            .checked_add(increment)
            .ok_or(DeltaError::Overflow)
    }

    /// Rewards `account` could claim at `now`
    pub fn earned(&self, account: &Address, now: u64, balance: Amount) -> Result<Amount> {
        self.earned_at(account, self.reward_per_share(now, balance)?)
    }

    /// Total emitted so far, including the pending emission
    pub fn total_emitted(&self, now: u64, balance: Amount) -> Result<Amount> {
        checked_add(self.total_emitted, self.pending_emission(now, balance))
    }

    fn earned_at(&self, account: &Address, reward_per_share: U256) -> Result<Amount> {
        let paid = self.paid.get(account).copied().unwrap_or_default();
        let delta = reward_per_share.saturating_sub(paid);
        let pending = U256::from(self.shares_of(account))
            .checked_mul(delta)
            .ok_or(DeltaError::Overflow)?
            / U256::from(MANTISSA_ONE);
        let accrued = self.accrued.get(account).copied().unwrap_or(0);
        checked_add(accrued, narrow(pending)?)
    }

    // === Mutations ===

    /// Fold the pending emission into the accumulator
    ///
    /// Without shares nothing is emitted and the checkpoint does not move.
    pub fn update(&mut self, now: u64, balance: Amount) -> Result<()> {
        if self.total_shares == 0 {
            return Ok(());
        }
        let emission = self.pending_emission(now, balance);
        let reward_per_share = self.reward_per_share(now, balance)?;
        let total_emitted = checked_add(self.total_emitted, emission)?;

        self.reward_per_share = reward_per_share;
        self.total_emitted = total_emitted;
        self.carried = 0;
        self.last_update = now;
        if emission > 0 {
            debug!(emission, total_emitted, checkpoint = now, "reward accumulator updated");
        }
        Ok(())
    }

    /// Bank the idle window at the current rate and move the checkpoint
    fn carry_idle(&mut self, now: u64, balance: Amount) {
        let carried = self
            .rate
            .saturating_mul(self.elapsed(now))
            .saturating_add(self.carried)
            .min(self.unallocated(balance));
        if carried > self.carried {
            debug!(carried, checkpoint = now, "idle emission carried");
        }
        self.carried = carried;
        self.last_update = now;
    }

    /// Crystallize `account`'s pending reward
    pub fn settle(&mut self, account: &Address, now: u64, balance: Amount) -> Result<()> {
        self.update(now, balance)?;
        let earned = self.earned_at(account, self.reward_per_share)?;
        self.accrued.insert(*account, earned);
        self.paid.insert(*account, self.reward_per_share);
        Ok(())
    }

    pub fn mint_shares(&mut self, account: &Address, amount: Amount, now: u64, balance: Amount) -> Result<()> {
        let held = checked_add(self.shares_of(account), amount)?;
        let total = checked_add(self.total_shares, amount)?;

        self.settle(account, now, balance)?;
        self.shares.insert(*account, held);
        self.total_shares = total;
        Ok(())
    }

    pub fn burn_shares(&mut self, account: &Address, amount: Amount, now: u64, balance: Amount) -> Result<()> {
        let held = self.shares_of(account);
        if held < amount {
            return Err(DeltaError::InsufficientShares { required: amount, available: held });
        }

        self.settle(account, now, balance)?;
        self.shares.insert(*account, held - amount);
        self.total_shares -= amount;
        Ok(())
    }

    /// Settle `account` and zero its accrued reward, returning the amount
    /// the caller must pay out
    pub fn take_reward(&mut self, account: &Address, now: u64, balance: Amount) -> Result<Amount> {
        self.settle(account, now, balance)?;
        let reward = self.accrued.get(account).copied().unwrap_or(0);
        if reward > 0 {
            self.total_claimed = checked_add(self.total_claimed, reward)?;
            self.accrued.insert(*account, 0);
        }
        Ok(reward)
    }

    /// Start a new funded period of `amount`, folding in whatever the current
    /// period has not emitted yet. `balance` must already include `amount`.
    pub fn notify(&mut self, amount: Amount, now: u64, balance: Amount) -> Result<()> {
        let Emission::Scheduled { duration } = self.emission else {
            return Err(DeltaError::EmissionMismatch("notify_reward_amount"));
        };
        self.update(now, balance)?;

        let total = checked_add(amount, self.unvested())?;
        let rate = total / duration as u128;
        let required = rate.saturating_mul(duration as u128);
        let available = self.unallocated(balance).saturating_sub(self.carried);
        if required > available {
            return Err(DeltaError::RewardTooHigh { required, available });
        }

        self.rate = rate;
        self.last_update = now;
        self.period_finish = now.saturating_add(duration);
        debug!(rate, period_finish = self.period_finish, "reward period funded");
        Ok(())
    }

    /// Change the emission rate without touching what already accrued,
    /// including an idle window owed to the first holders. Returns the
    /// previous rate.
    pub fn set_rate(&mut self, rate: Amount, now: u64, balance: Amount) -> Result<Amount> {
        if self.total_shares == 0 {
            self.carry_idle(now, balance);
        } else {
            self.update(now, balance)?;
        }
        Ok(std::mem::replace(&mut self.rate, rate))
    }

    /// Reward balance neither allocated to holders nor scheduled
    pub fn sweepable(&mut self, now: u64, balance: Amount) -> Result<Amount> {
        self.update(now, balance)?;
        Ok(self
            .unallocated(balance)
            .saturating_sub(self.unvested())
            .saturating_sub(self.carried))
    }
}
