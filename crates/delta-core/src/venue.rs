//! # Yield Venue
//!
//! Interface to the external interest-bearing position an earning pool parks
//! its underlying in, plus a compound-style simulator.
//!
//! A venue holds its liquidity in the [`AssetLedger`] under its own address and
//! tracks holders in venue-native units. `exchange_rate` converts units to
//! underlying as an 18-decimal mantissa and never decreases.

use crate::asset::AssetLedger;
use crate::error::{DeltaError, Result};
use crate::math::{checked_add, checked_sub, mul_div, mul_div_ceil, mul_mantissa, MANTISSA_ONE};
use crate::types::{Address, Amount};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// External yield-bearing position
pub trait YieldVenue: fmt::Debug + Send + Sync {
    /// Venue contract address; holds the venue's underlying liquidity
    fn address(&self) -> Address;

    /// Asset accepted by the venue
    fn underlying(&self) -> Address;

    /// Distinct token the venue pays to holders, if any
    fn reward_token(&self) -> Option<Address>;

    /// Holder's claim in venue-native units
    fn balance_of(&self, holder: &Address) -> Amount;

    /// Units to underlying, scaled by 1e18
    fn exchange_rate(&self) -> u128;

    /// Holder's claim converted to underlying, rounded down
    fn balance_of_underlying(&self, holder: &Address) -> Result<Amount> {
        mul_mantissa(self.balance_of(holder), self.exchange_rate())
    }

    /// Underlying value `holder` gains by minting with `amount`
    ///
    /// Smaller than `amount` when the minted units round down.
    fn preview_mint(&self, holder: &Address, amount: Amount) -> Result<Amount> {
        let rate = self.exchange_rate();
        let held = self.balance_of(holder);
        let minted = mul_div(amount, MANTISSA_ONE, rate)?;
        let after = mul_mantissa(checked_add(held, minted)?, rate)?;
        Ok(after.saturating_sub(self.balance_of_underlying(holder)?))
    }

    /// Underlying value `holder` gives up by redeeming `amount`
    ///
    /// At least `amount` when the burned units round up.
    fn preview_redeem(&self, holder: &Address, amount: Amount) -> Result<Amount> {
        let rate = self.exchange_rate();
        let held = self.balance_of(holder);
        let burned = mul_div_ceil(amount, MANTISSA_ONE, rate)?;
        if held < burned {
            return Err(DeltaError::VenueShortfall {
                required: burned,
                available: held,
            });
        }
        let after = mul_mantissa(held - burned, rate)?;
        Ok(self.balance_of_underlying(holder)? - after)
    }

    /// Supply `amount` underlying from `holder`; returns units minted
    fn mint(&mut self, assets: &mut AssetLedger, holder: &Address, amount: Amount) -> Result<Amount>;

    /// Return exactly `amount` underlying to `holder`; returns units burned
    fn redeem_underlying(
        &mut self,
        assets: &mut AssetLedger,
        holder: &Address,
        amount: Amount,
    ) -> Result<Amount>;

    fn clone_box(&self) -> Box<dyn YieldVenue>;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl Clone for Box<dyn YieldVenue> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// In-memory compound-style venue
///
/// Interest is accrued explicitly with [`SimulatedVenue::accrue_interest`],
/// which raises the exchange rate and funds the extra underlying.
#[derive(Clone, Debug)]
pub struct SimulatedVenue {
    address: Address,
    underlying: Address,
    reward_token: Option<Address>,
    exchange_rate: u128,
    units: HashMap<Address, Amount>,
    total_units: Amount,
}

impl SimulatedVenue {
    pub fn new(address: Address, underlying: Address, exchange_rate: u128) -> Result<Self> {
        if exchange_rate == 0 {
            return Err(DeltaError::InvalidParameter(
                "venue exchange rate must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            address,
            underlying,
            reward_token: None,
            exchange_rate,
            units: HashMap::new(),
            total_units: 0,
        })
    }

    /// Attach the token this venue pays out as a holder reward
    pub fn with_reward_token(mut self, token: Address) -> Self {
        self.reward_token = Some(token);
        self
    }

    pub fn total_units(&self) -> Amount {
        self.total_units
    }

    /// Multiply the exchange rate by `multiplier` (1e18 = unchanged)
    ///
    /// The venue is credited with the underlying its holders gained so that
    /// every claim stays redeemable.
    pub fn accrue_interest(&mut self, assets: &mut AssetLedger, multiplier: u128) -> Result<()> {
        if multiplier < MANTISSA_ONE {
            return Err(DeltaError::InvalidParameter(
                "venue exchange rate can only increase".to_string(),
            ));
        }
        let new_rate = mul_mantissa(self.exchange_rate, multiplier)?;
        let before = mul_mantissa(self.total_units, self.exchange_rate)?;
        let after = mul_mantissa(self.total_units, new_rate)?;
        assets.mint(&self.underlying, &self.address, after - before)?;

        tracing::debug!(venue = %self.address, old = self.exchange_rate, new = new_rate, "venue interest accrued");
        self.exchange_rate = new_rate;
        Ok(())
    }

    /// Pay `amount` of the venue reward token to `holder`
    pub fn distribute_reward(&self, assets: &mut AssetLedger, holder: &Address, amount: Amount) -> Result<()> {
        let token = self.reward_token.ok_or_else(|| {
            DeltaError::InvalidParameter("venue has no reward token".to_string())
        })?;
        assets.mint(&token, holder, amount)
    }
}

impl YieldVenue for SimulatedVenue {
    fn address(&self) -> Address {
        self.address
    }

    fn underlying(&self) -> Address {
        self.underlying
    }

    fn reward_token(&self) -> Option<Address> {
        self.reward_token
    }

    fn balance_of(&self, holder: &Address) -> Amount {
        self.units.get(holder).copied().unwrap_or(0)
    }

    fn exchange_rate(&self) -> u128 {
        self.exchange_rate
    }

    fn mint(&mut self, assets: &mut AssetLedger, holder: &Address, amount: Amount) -> Result<Amount> {
        let minted = mul_div(amount, MANTISSA_ONE, self.exchange_rate)?;
        let held = checked_add(self.balance_of(holder), minted)?;
        let total = checked_add(self.total_units, minted)?;

        assets.transfer(&self.underlying, holder, &self.address, amount)?;
        self.units.insert(*holder, held);
        self.total_units = total;
        Ok(minted)
    }

    fn redeem_underlying(
        &mut self,
        assets: &mut AssetLedger,
        holder: &Address,
        amount: Amount,
    ) -> Result<Amount> {
        let burned = mul_div_ceil(amount, MANTISSA_ONE, self.exchange_rate)?;
        let held = self.balance_of(holder);
        if held < burned {
            return Err(DeltaError::VenueShortfall {
                required: amount,
                available: self.balance_of_underlying(holder)?,
            });
        }
        let liquidity = assets.balance_of(&self.underlying, &self.address);
        if liquidity < amount {
            return Err(DeltaError::VenueShortfall {
                required: amount,
                available: liquidity,
            });
        }

        assets.transfer(&self.underlying, &self.address, holder, amount)?;
        self.units.insert(*holder, held - burned);
        self.total_units = checked_sub(self.total_units, burned)?;
        Ok(burned)
    }

    fn clone_box(&self) -> Box<dyn YieldVenue> {
        Box::new(self.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
