//! # Execution Environment
//!
//! Everything outside the pools that a call executes against: the asset
//! ledger, the yield venues, the clock and the event log.
//!
//! Calls are all-or-nothing. [`atomic`] snapshots any `Clone` state before a
//! call and restores it if the call fails, so a failure late in a composite
//! operation never leaves an earlier leg applied.

use crate::asset::AssetLedger;
use crate::clock::Clock;
use crate::error::{DeltaError, Result};
use crate::event::{Event, EventLog};
use crate::types::{Address, Amount};
use crate::venue::{SimulatedVenue, YieldVenue};
use std::collections::BTreeMap;

/// Run `f` against `state`, discarding every change if it fails
pub fn atomic<S: Clone, T>(state: &mut S, f: impl FnOnce(&mut S) -> Result<T>) -> Result<T> {
    let snapshot = state.clone();
    match f(state) {
        Ok(value) => Ok(value),
        Err(err) => {
            tracing::debug!(error = %err, code = err.code(), "call reverted");
            *state = snapshot;
            Err(err)
        }
    }
}

/// External world shared by every component
#[derive(Clone, Debug, Default)]
pub struct Env {
    /// Balances of every fungible asset
    pub assets: AssetLedger,

    /// Current execution point
    pub clock: Clock,

    /// Emitted events
    pub events: EventLog,

    venues: BTreeMap<Address, Box<dyn YieldVenue>>,
}

impl Env {
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            ..Default::default()
        }
    }

    pub fn emit(&mut self, emitter: Address, event: Event) {
        self.events.emit(emitter, &self.clock, event);
    }

    // === Assets ===

    /// Issue `amount` of `asset` to `to`
    pub fn mint_asset(&mut self, asset: &Address, to: &Address, amount: Amount) -> Result<()> {
        self.assets.mint(asset, to, amount)?;
        self.emit(*asset, Event::Transfer { from: Address::ZERO, to: *to, amount });
        Ok(())
    }

    pub fn transfer(&mut self, asset: &Address, from: &Address, to: &Address, amount: Amount) -> Result<()> {
        self.assets.transfer(asset, from, to, amount)?;
        self.emit(*asset, Event::Transfer { from: *from, to: *to, amount });
        Ok(())
    }

    pub fn transfer_from(
        &mut self,
        asset: &Address,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<()> {
        self.assets.transfer_from(asset, spender, from, to, amount)?;
        self.emit(*asset, Event::Transfer { from: *from, to: *to, amount });
        Ok(())
    }

    pub fn approve(&mut self, asset: &Address, owner: &Address, spender: &Address, amount: Amount) -> Result<()> {
        self.assets.approve(asset, owner, spender, amount)?;
        self.emit(*asset, Event::Approval { owner: *owner, spender: *spender, amount });
        Ok(())
    }

    pub fn balance_of(&self, asset: &Address, account: &Address) -> Amount {
        self.assets.balance_of(asset, account)
    }

    // === Venues ===

    pub fn add_venue(&mut self, venue: Box<dyn YieldVenue>) -> Result<()> {
        let address = venue.address();
        if self.venues.contains_key(&address) {
            return Err(DeltaError::InvalidParameter(format!(
                "yield venue already registered: {address}"
            )));
        }
        if !self.assets.contains(&venue.underlying()) {
            return Err(DeltaError::UnknownAsset(venue.underlying()));
        }
        self.venues.insert(address, venue);
        Ok(())
    }

    pub fn venue(&self, address: &Address) -> Result<&dyn YieldVenue> {
        self.venues
            .get(address)
            .map(|v| v.as_ref())
            .ok_or(DeltaError::UnknownVenue(*address))
    }

    /// Supply `amount` underlying from `holder` into the venue
    pub fn venue_mint(&mut self, venue: &Address, holder: &Address, amount: Amount) -> Result<Amount> {
        let entry = self
            .venues
            .get_mut(venue)
            .ok_or(DeltaError::UnknownVenue(*venue))?;
        let underlying = entry.underlying();
        let units = entry.mint(&mut self.assets, holder, amount)?;
        self.emit(underlying, Event::Transfer { from: *holder, to: *venue, amount });
        Ok(units)
    }

    /// Redeem exactly `amount` underlying from the venue to `holder`
    pub fn venue_redeem(&mut self, venue: &Address, holder: &Address, amount: Amount) -> Result<Amount> {
        let entry = self
            .venues
            .get_mut(venue)
            .ok_or(DeltaError::UnknownVenue(*venue))?;
        let underlying = entry.underlying();
        let units = entry.redeem_underlying(&mut self.assets, holder, amount)?;
        self.emit(underlying, Event::Transfer { from: *venue, to: *holder, amount });
        Ok(units)
    }

    /// Raise a simulated venue's exchange rate by `multiplier` (1e18 = unchanged)
    pub fn accrue_interest(&mut self, venue: &Address, multiplier: u128) -> Result<()> {
        simulated_mut(&mut self.venues, venue)?.accrue_interest(&mut self.assets, multiplier)
    }

    /// Pay a simulated venue's reward token to `holder`
    pub fn distribute_venue_reward(&mut self, venue: &Address, holder: &Address, amount: Amount) -> Result<()> {
        simulated_mut(&mut self.venues, venue)?.distribute_reward(&mut self.assets, holder, amount)
    }

    // === Clock ===

    pub fn advance_time(&mut self, seconds: u64) {
        self.clock.advance_time(seconds);
    }

    pub fn mine(&mut self, blocks: u64, seconds_per_block: u64) {
        self.clock.mine(blocks, seconds_per_block);
    }
}

fn simulated_mut<'a>(
    venues: &'a mut BTreeMap<Address, Box<dyn YieldVenue>>,
    address: &Address,
) -> Result<&'a mut SimulatedVenue> {
    venues
        .get_mut(address)
        .and_then(|v| v.as_any_mut().downcast_mut::<SimulatedVenue>())
        .ok_or(DeltaError::UnknownVenue(*address))
}
