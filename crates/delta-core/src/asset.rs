//! # Asset Ledger
//!
//! Standard fungible-asset balances for every asset the system touches:
//! underlyings, venue reward tokens, mined reward tokens and stake assets.
//!
//! Each asset carries its own decimal precision; nothing in the core assumes a
//! particular precision. An allowance of [`UNLIMITED_ALLOWANCE`] is never
//! decremented, which is how the pool token authorizes its earning pools.

use crate::error::{DeltaError, Result};
use crate::math::{checked_add, MAX_DECIMALS};
use crate::types::{Address, Amount};
use std::collections::HashMap;

/// Allowance that is never consumed by `transfer_from`
pub const UNLIMITED_ALLOWANCE: Amount = Amount::MAX;

/// Asset definition and balances
#[derive(Clone, Debug)]
pub struct Asset {
    /// Asset identity
    pub id: Address,

    /// Ticker, e.g. "USDC"
    pub symbol: String,

    /// Decimal places of the smallest unit
    pub decimals: u8,

    /// Current supply
    pub total_supply: Amount,

    balances: HashMap<Address, Amount>,

    allowances: HashMap<(Address, Address), Amount>,
}

impl Asset {
    fn new(id: Address, symbol: String, decimals: u8) -> Self {
        Self {
            id,
            symbol,
            decimals,
            total_supply: 0,
            balances: HashMap::new(),
            allowances: HashMap::new(),
        }
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances.get(&(*owner, *spender)).copied().unwrap_or(0)
    }

    fn ensure_balance(&self, account: &Address, amount: Amount) -> Result<()> {
        let available = self.balance_of(account);
        if available < amount {
            return Err(DeltaError::InsufficientBalance {
                asset: self.id,
                account: *account,
                required: amount,
                available,
            });
        }
        Ok(())
    }

    fn credit(&mut self, account: &Address, amount: Amount) -> Result<()> {
        let balance = self.balances.entry(*account).or_insert(0);
        *balance = checked_add(*balance, amount)?;
        Ok(())
    }

    fn debit(&mut self, account: &Address, amount: Amount) -> Result<()> {
        self.ensure_balance(account, amount)?;
        if let Some(balance) = self.balances.get_mut(account) {
            *balance -= amount;
        }
        Ok(())
    }
}

/// Ledger of all fungible assets
#[derive(Clone, Debug, Default)]
pub struct AssetLedger {
    assets: HashMap<Address, Asset>,
}

impl AssetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new asset
    pub fn register(&mut self, id: Address, symbol: impl Into<String>, decimals: u8) -> Result<()> {
        if decimals > MAX_DECIMALS {
            return Err(DeltaError::InvalidParameter(format!(
                "decimals {decimals} exceeds {MAX_DECIMALS}"
            )));
        }
        if self.assets.contains_key(&id) {
            return Err(DeltaError::AssetExists(id));
        }
        self.assets.insert(id, Asset::new(id, symbol.into(), decimals));
        Ok(())
    }

    pub fn get(&self, id: &Address) -> Result<&Asset> {
        self.assets.get(id).ok_or(DeltaError::UnknownAsset(*id))
    }

    fn get_mut(&mut self, id: &Address) -> Result<&mut Asset> {
        self.assets.get_mut(id).ok_or(DeltaError::UnknownAsset(*id))
    }

    pub fn contains(&self, id: &Address) -> bool {
        self.assets.contains_key(id)
    }

    pub fn decimals(&self, id: &Address) -> Result<u8> {
        Ok(self.get(id)?.decimals)
    }

    /// Balance of `account`; zero for unknown assets
    pub fn balance_of(&self, id: &Address, account: &Address) -> Amount {
        self.assets
            .get(id)
            .map(|asset| asset.balance_of(account))
            .unwrap_or(0)
    }

    pub fn allowance(&self, id: &Address, owner: &Address, spender: &Address) -> Amount {
        self.assets
            .get(id)
            .map(|asset| asset.allowance(owner, spender))
            .unwrap_or(0)
    }

    pub fn total_supply(&self, id: &Address) -> Amount {
        self.assets.get(id).map(|a| a.total_supply).unwrap_or(0)
    }

    /// Create new units out of thin air (issuer faucet)
    pub fn mint(&mut self, id: &Address, to: &Address, amount: Amount) -> Result<()> {
        let asset = self.get_mut(id)?;
        let supply = checked_add(asset.total_supply, amount)?;
        asset.credit(to, amount)?;
        asset.total_supply = supply;
        Ok(())
    }

    /// Destroy units held by `from`
    pub fn burn(&mut self, id: &Address, from: &Address, amount: Amount) -> Result<()> {
        let asset = self.get_mut(id)?;
        asset.debit(from, amount)?;
        asset.total_supply = asset.total_supply.saturating_sub(amount);
        Ok(())
    }

    /// Move units from `from` to `to`
    pub fn transfer(&mut self, id: &Address, from: &Address, to: &Address, amount: Amount) -> Result<()> {
        let asset = self.get_mut(id)?;
        asset.debit(from, amount)?;
        asset.credit(to, amount)
    }

    pub fn approve(&mut self, id: &Address, owner: &Address, spender: &Address, amount: Amount) -> Result<()> {
        let asset = self.get_mut(id)?;
        asset.allowances.insert((*owner, *spender), amount);
        Ok(())
    }

    /// Move units from `from` to `to` on behalf of `spender`
    pub fn transfer_from(
        &mut self,
        id: &Address,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<()> {
        let asset = self.get_mut(id)?;
        let allowed = asset.allowance(from, spender);
        if spender != from && allowed < amount {
            return Err(DeltaError::InsufficientAllowance {
                asset: *id,
                spender: *spender,
                required: amount,
                available: allowed,
            });
        }
        asset.ensure_balance(from, amount)?;

        if spender != from && allowed != UNLIMITED_ALLOWANCE {
            asset.allowances.insert((*from, *spender), allowed - amount);
        }
        asset.debit(from, amount)?;
        asset.credit(to, amount)
    }

    /// Check that `transfer_from` would succeed without performing it
    pub fn can_transfer_from(&self, id: &Address, spender: &Address, from: &Address, amount: Amount) -> Result<()> {
        let asset = self.get(id)?;
        let allowed = asset.allowance(from, spender);
        if spender != from && allowed < amount {
            return Err(DeltaError::InsufficientAllowance {
                asset: *id,
                spender: *spender,
                required: amount,
                available: allowed,
            });
        }
        asset.ensure_balance(from, amount)
    }
}
