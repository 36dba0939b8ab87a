//! # Earning Pool
//!
//! Owns one underlying's position in one yield venue.
//!
//! Depositors receive one share per unit of underlying deposited, so shares
//! always equal principal. Everything the pool holds above `total_shares`
//! (venue yield and retained withdraw fees) is earning, swept to the earning
//! recipient by `dispense_earning`. Venue reward tokens accumulate separately
//! and are swept by `dispense_reward`.
//!
//! Deposits the venue would round down are kept locally in part, and
//! redemptions free the full worth of the venue units they burn, so a
//! depositor always gets the principal back.
//!
//! Every entry point checks all failure conditions before mutating anything.

use delta_core::error::{DeltaError, Operation, Result};
use delta_core::math::{checked_add, checked_sub, mul_mantissa, MANTISSA_ONE};
use delta_core::{Address, Amount, Env, Event, Ownable};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Bound on the rounds spent shrinking a deposit to what the venue credits
const SUPPLY_ALIGN_ROUNDS: usize = 8;

/// Point-in-time view of a pool's accounting
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EarningPoolStats {
    pub address: Address,
    pub underlying: Address,
    #[serde(with = "delta_core::amount_string")]
    pub total_shares: Amount,
    #[serde(with = "delta_core::amount_string")]
    pub pool_value: Amount,
    #[serde(with = "delta_core::amount_string")]
    pub undispensed_earning: Amount,
    #[serde(with = "delta_core::amount_string")]
    pub undispensed_reward: Amount,
    #[serde(with = "delta_core::amount_string")]
    pub withdraw_fee_factor: Amount,
}

/// Per-underlying vault over a yield venue
#[derive(Clone, Debug)]
pub struct EarningPool {
    address: Address,
    underlying: Address,
    venue: Address,
    reward_token: Option<Address>,
    ownable: Ownable,

    shares: HashMap<Address, Amount>,
    total_shares: Amount,

    /// Fraction of each withdrawal kept by the pool, scaled by 1e18
    withdraw_fee_factor: Amount,
    earning_recipient: Option<Address>,
    reward_recipient: Option<Address>,
    earning_dispense_threshold: Amount,
    reward_dispense_threshold: Amount,
}

impl EarningPool {
    /// Create a pool over an already registered venue
    ///
    /// `reward_token` is the venue's distinct reward asset; when `None` the
    /// venue's own declaration is used.
    pub fn new(
        env: &Env,
        address: Address,
        owner: Address,
        venue: Address,
        reward_token: Option<Address>,
    ) -> Result<Self> {
        let handle = env.venue(&venue)?;
        let underlying = handle.underlying();
        let reward_token = reward_token.or_else(|| handle.reward_token());
        if let Some(token) = reward_token {
            env.assets.get(&token)?;
        }

        Ok(Self {
            address,
            underlying,
            venue,
            reward_token,
            ownable: Ownable::new(owner),
            shares: HashMap::new(),
            total_shares: 0,
            withdraw_fee_factor: 0,
            earning_recipient: None,
            reward_recipient: None,
            earning_dispense_threshold: 0,
            reward_dispense_threshold: 0,
        })
    }

    // === Views ===

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn underlying(&self) -> Address {
        self.underlying
    }

    pub fn venue(&self) -> Address {
        self.venue
    }

    /// Distinct venue reward token held by the pool
    pub fn reward_token(&self) -> Option<Address> {
        self.reward_token
    }

    pub fn owner(&self) -> Address {
        self.ownable.owner()
    }

    pub fn shares_of(&self, account: &Address) -> Amount {
        self.shares.get(account).copied().unwrap_or(0)
    }

    pub fn total_shares(&self) -> Amount {
        self.total_shares
    }

    pub fn withdraw_fee_factor(&self) -> Amount {
        self.withdraw_fee_factor
    }

    pub fn earning_recipient(&self) -> Option<Address> {
        self.earning_recipient
    }

    pub fn reward_recipient(&self) -> Option<Address> {
        self.reward_recipient
    }

    pub fn earning_dispense_threshold(&self) -> Amount {
        self.earning_dispense_threshold
    }

    pub fn reward_dispense_threshold(&self) -> Amount {
        self.reward_dispense_threshold
    }

    /// Underlying held locally (retained fees and deposit remainders)
    pub fn balance_in_underlying(&self, env: &Env) -> Amount {
        env.balance_of(&self.underlying, &self.address)
    }

    /// Venue position converted to underlying
    pub fn venue_balance_in_underlying(&self, env: &Env) -> Result<Amount> {
        env.venue(&self.venue)?.balance_of_underlying(&self.address)
    }

    /// Venue position plus local balance
    pub fn calc_pool_value_in_underlying(&self, env: &Env) -> Result<Amount> {
        checked_add(self.venue_balance_in_underlying(env)?, self.balance_in_underlying(env))
    }

    /// Pool value above principal
    pub fn calc_undispensed_earning_in_underlying(&self, env: &Env) -> Result<Amount> {
        Ok(self
            .calc_pool_value_in_underlying(env)?
            .saturating_sub(self.total_shares))
    }

    /// Venue reward tokens held by the pool
    pub fn calc_undispensed_provider_reward(&self, env: &Env) -> Amount {
        self.reward_token
            .map(|token| env.balance_of(&token, &self.address))
            .unwrap_or(0)
    }

    pub fn stats(&self, env: &Env) -> Result<EarningPoolStats> {
        Ok(EarningPoolStats {
            address: self.address,
            underlying: self.underlying,
            total_shares: self.total_shares,
            pool_value: self.calc_pool_value_in_underlying(env)?,
            undispensed_earning: self.calc_undispensed_earning_in_underlying(env)?,
            undispensed_reward: self.calc_undispensed_provider_reward(env),
            withdraw_fee_factor: self.withdraw_fee_factor,
        })
    }

    // === User operations ===

    /// Pull `amount` underlying from `caller` into the venue and credit
    /// `beneficiary` with the same number of shares
    pub fn deposit(&mut self, env: &mut Env, caller: Address, beneficiary: Address, amount: Amount) -> Result<()> {
        if amount == 0 {
            return Err(DeltaError::ZeroAmount(Operation::Deposit));
        }
        env.assets
            .can_transfer_from(&self.underlying, &self.address, &caller, amount)?;
        let total_shares = checked_add(self.total_shares, amount)?;
        let beneficiary_shares = checked_add(self.shares_of(&beneficiary), amount)?;
        let supplied = self.venue_supply_amount(env, amount)?;

        self.shares.insert(beneficiary, beneficiary_shares);
        self.total_shares = total_shares;

        env.transfer_from(&self.underlying, &self.address, &caller, &self.address, amount)?;
        if supplied > 0 {
            env.venue_mint(&self.venue, &self.address, supplied)?;
        }
        if supplied < amount {
            debug!(pool = %self.address, kept = amount - supplied, "deposit remainder kept locally");
        }

        env.emit(self.address, Event::Deposited { payer: caller, beneficiary, amount });
        info!(pool = %self.address, payer = %caller, %beneficiary, amount, "deposited");
        Ok(())
    }

    /// Burn `amount` of `caller`'s shares and send the underlying, less the
    /// withdraw fee, to `beneficiary`. Returns the amount sent.
    pub fn withdraw(&mut self, env: &mut Env, caller: Address, beneficiary: Address, amount: Amount) -> Result<Amount> {
        if amount == 0 {
            return Err(DeltaError::ZeroAmount(Operation::Withdraw));
        }
        let available = self.shares_of(&caller);
        if available < amount {
            return Err(DeltaError::InsufficientShares { required: amount, available });
        }
        let pool_value = self.calc_pool_value_in_underlying(env)?;
        if pool_value < amount {
            return Err(DeltaError::VenueShortfall { required: amount, available: pool_value });
        }
        let fee = mul_mantissa(amount, self.withdraw_fee_factor)?;
        let net = amount - fee;
        let draw = self.venue_draw_amount(env, amount)?;

        self.shares.insert(caller, available - amount);
        self.total_shares = checked_sub(self.total_shares, amount)?;

        if draw > 0 {
            env.venue_redeem(&self.venue, &self.address, draw)?;
        }
        env.transfer(&self.underlying, &self.address, &beneficiary, net)?;

        env.emit(self.address, Event::Withdrawn { payer: caller, beneficiary, amount });
        info!(pool = %self.address, payer = %caller, %beneficiary, amount, fee, "withdrawn");
        Ok(net)
    }

    /// Sweep all undispensed earning to the earning recipient
    ///
    /// A no-op returning zero when no recipient is set or the earning is
    /// below the threshold.
    pub fn dispense_earning(&mut self, env: &mut Env) -> Result<Amount> {
        let Some(recipient) = self.earning_recipient else {
            warn!(pool = %self.address, "earning recipient not set, skipping dispense");
            return Ok(0);
        };
        let earning = self.calc_undispensed_earning_in_underlying(env)?;
        if earning == 0 || earning < self.earning_dispense_threshold {
            warn!(
                pool = %self.address,
                earning,
                threshold = self.earning_dispense_threshold,
                "earning below dispense threshold"
            );
            return Ok(0);
        }

        let local = self.balance_in_underlying(env);
        if earning > local {
            let draw = self.venue_draw_amount(env, earning - local)?;
            if draw > 0 {
                env.venue_redeem(&self.venue, &self.address, draw)?;
            }
        }
        // a draw that burns a partial unit shrinks the earning
        let earning = earning
            .min(self.calc_undispensed_earning_in_underlying(env)?)
            .min(self.balance_in_underlying(env));
        if earning == 0 {
            return Ok(0);
        }
        env.transfer(&self.underlying, &self.address, &recipient, earning)?;

        env.emit(
            self.address,
            Event::Dispensed { token: self.underlying, recipient, amount: earning },
        );
        info!(pool = %self.address, %recipient, amount = earning, "earning dispensed");
        Ok(earning)
    }

    /// Part of `amount` the venue credits at full value
    ///
    /// Whatever the venue would round away stays in the pool's local balance,
    /// so a deposit never loses principal.
    fn venue_supply_amount(&self, env: &Env, amount: Amount) -> Result<Amount> {
        let venue = env.venue(&self.venue)?;
        let mut supplied = amount;
        for _ in 0..SUPPLY_ALIGN_ROUNDS {
            if supplied == 0 {
                break;
            }
            let credited = venue.preview_mint(&self.address, supplied)?;
            if credited >= supplied {
                return Ok(supplied);
            }
            supplied = credited;
        }
        Ok(0)
    }

    /// Underlying to redeem from the venue to free at least `wanted`
    ///
    /// Capped at the venue position. Rounded up to the full worth of the units
    /// burned, unless that costs more; the excess lands in the local balance.
    fn venue_draw_amount(&self, env: &Env, wanted: Amount) -> Result<Amount> {
        let venue = env.venue(&self.venue)?;
        let position = venue.balance_of_underlying(&self.address)?;
        let wanted = wanted.min(position);
        if wanted == 0 {
            return Ok(0);
        }
        let cost = venue.preview_redeem(&self.address, wanted)?;
        if cost > wanted && cost <= position && venue.preview_redeem(&self.address, cost)? == cost {
            return Ok(cost);
        }
        Ok(wanted)
    }

    /// Sweep all venue reward tokens to the reward recipient
    pub fn dispense_reward(&mut self, env: &mut Env) -> Result<Amount> {
        let (Some(recipient), Some(token)) = (self.reward_recipient, self.reward_token) else {
            warn!(pool = %self.address, "reward recipient or token not set, skipping dispense");
            return Ok(0);
        };
        let reward = env.balance_of(&token, &self.address);
        if reward == 0 || reward < self.reward_dispense_threshold {
            warn!(
                pool = %self.address,
                reward,
                threshold = self.reward_dispense_threshold,
                "reward below dispense threshold"
            );
            return Ok(0);
        }

        env.transfer(&token, &self.address, &recipient, reward)?;

        env.emit(self.address, Event::Dispensed { token, recipient, amount: reward });
        info!(pool = %self.address, %recipient, amount = reward, "provider reward dispensed");
        Ok(reward)
    }

    // === Owner setters ===

    pub fn set_withdraw_fee_factor(&mut self, env: &mut Env, caller: Address, factor: Amount) -> Result<()> {
        self.ownable.ensure_owner(&caller)?;
        if factor >= MANTISSA_ONE {
            return Err(DeltaError::InvalidFeeFactor(factor));
        }
        let old = std::mem::replace(&mut self.withdraw_fee_factor, factor);
        env.emit(self.address, Event::WithdrawFeeFactorChanged { old, new: factor });
        debug!(pool = %self.address, old, new = factor, "withdraw fee factor changed");
        Ok(())
    }

    pub fn set_earning_recipient(&mut self, env: &mut Env, caller: Address, recipient: Option<Address>) -> Result<()> {
        self.ownable.ensure_owner(&caller)?;
        let old = std::mem::replace(&mut self.earning_recipient, recipient);
        env.emit(self.address, Event::EarningRecipientChanged { old, new: recipient });
        Ok(())
    }

    pub fn set_reward_recipient(&mut self, env: &mut Env, caller: Address, recipient: Option<Address>) -> Result<()> {
        self.ownable.ensure_owner(&caller)?;
        let old = std::mem::replace(&mut self.reward_recipient, recipient);
        env.emit(self.address, Event::RewardRecipientChanged { old, new: recipient });
        Ok(())
    }

    pub fn set_earning_dispense_threshold(&mut self, env: &mut Env, caller: Address, threshold: Amount) -> Result<()> {
        self.ownable.ensure_owner(&caller)?;
        let old = std::mem::replace(&mut self.earning_dispense_threshold, threshold);
        env.emit(self.address, Event::EarningDispenseThresholdChanged { old, new: threshold });
        Ok(())
    }

    pub fn set_reward_dispense_threshold(&mut self, env: &mut Env, caller: Address, threshold: Amount) -> Result<()> {
        self.ownable.ensure_owner(&caller)?;
        let old = std::mem::replace(&mut self.reward_dispense_threshold, threshold);
        env.emit(self.address, Event::RewardDispenseThresholdChanged { old, new: threshold });
        Ok(())
    }

    pub fn transfer_ownership(&mut self, env: &mut Env, caller: Address, new_owner: Address) -> Result<()> {
        let previous = self.ownable.transfer_ownership(&caller, new_owner)?;
        env.emit(self.address, Event::OwnershipTransferred { previous, new: new_owner });
        Ok(())
    }
}
