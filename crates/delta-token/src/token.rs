//! # Pool Token
//!
//! User-facing fungible balance backed by several underlyings at once.
//!
//! Minting deposits the underlying into its earning pool on behalf of the
//! token itself, so earning-pool shares accrue to the token and the user
//! holds pool-token balance instead. Every balance change is mirrored into
//! the managed reward pool, keeping reward shares equal to the balance.
//!
//! Amounts cross between the underlying's precision and the token's own
//! precision: rounded down on the way in, and the burn on the way out is
//! rounded up.
//!
//! A call touches several components. Each validates before mutating, but
//! a composite call is only all-or-nothing when run through
//! [`Protocol`](crate::Protocol), which wraps every call in
//! [`atomic`](delta_core::atomic).

use crate::contracts::Contracts;
use delta_core::error::{DeltaError, Operation, Result};
use delta_core::math::{checked_add, checked_sub, scale_amount, scale_amount_ceil, MAX_DECIMALS};
use delta_core::{Address, Amount, Env, Event, Ownable, UNLIMITED_ALLOWANCE};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

/// Point-in-time view of the pool token
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PoolTokenStats {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    #[serde(with = "delta_core::amount_string")]
    pub total_supply: Amount,
    pub underlyings: Vec<Address>,
    pub paused: Vec<Address>,
}

#[derive(Clone, Debug)]
pub struct PoolToken {
    address: Address,
    name: String,
    symbol: String,
    decimals: u8,
    ownable: Ownable,

    balances: HashMap<Address, Amount>,
    allowances: HashMap<(Address, Address), Amount>,
    total_supply: Amount,

    /// Underlying to earning pool
    earning_pools: BTreeMap<Address, Address>,
    /// Underlyings in registration order
    underlyings: Vec<Address>,
    paused: BTreeSet<Address>,
    reward_pool: Address,
}

impl PoolToken {
    /// Deploy a token routing through `earning_pools`, all of which must
    /// already be deployed in `contracts`
    pub fn new(
        contracts: &mut Contracts,
        address: Address,
        owner: Address,
        name: impl Into<String>,
        symbol: impl Into<String>,
        decimals: u8,
        earning_pools: &[Address],
    ) -> Result<Self> {
        if decimals > MAX_DECIMALS {
            return Err(DeltaError::InvalidParameter(format!(
                "pool token decimals {decimals} exceed {MAX_DECIMALS}"
            )));
        }

        let mut token = Self {
            address,
            name: name.into(),
            symbol: symbol.into(),
            decimals,
            ownable: Ownable::new(owner),
            balances: HashMap::new(),
            allowances: HashMap::new(),
            total_supply: 0,
            earning_pools: BTreeMap::new(),
            underlyings: Vec::new(),
            paused: BTreeSet::new(),
            reward_pool: contracts.reward_pool.address(),
        };
        for pool in earning_pools {
            token.register_earning_pool(contracts, *pool)?;
        }
        Ok(token)
    }

    // === Views ===

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn owner(&self) -> Address {
        self.ownable.owner()
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn reward_pool(&self) -> Address {
        self.reward_pool
    }

    pub fn supported_underlyings(&self) -> &[Address] {
        &self.underlyings
    }

    pub fn is_underlying_supported(&self, underlying: &Address) -> bool {
        self.earning_pools.contains_key(underlying)
    }

    pub fn earning_pool_for(&self, underlying: &Address) -> Option<Address> {
        self.earning_pools.get(underlying).copied()
    }

    pub fn is_paused(&self, underlying: &Address) -> bool {
        self.paused.contains(underlying)
    }

    pub fn stats(&self) -> PoolTokenStats {
        PoolTokenStats {
            address: self.address,
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            decimals: self.decimals,
            total_supply: self.total_supply,
            underlyings: self.underlyings.clone(),
            paused: self.paused.iter().copied().collect(),
        }
    }

    // === User operations ===

    /// Pull `amount` of `underlying` from `caller`, park it in the earning
    /// pool and credit `beneficiary`. Returns the pool-token amount minted.
    pub fn mint(
        &mut self,
        contracts: &mut Contracts,
        caller: Address,
        beneficiary: Address,
        underlying: Address,
        amount: Amount,
    ) -> Result<Amount> {
        if amount == 0 {
            return Err(DeltaError::ZeroAmount(Operation::Mint));
        }
        let pool = self.pool_for(&underlying)?;
        self.ensure_not_paused(&underlying)?;
        let minted = self.to_token_amount(&contracts.env, &underlying, amount)?;
        if minted == 0 {
            return Err(DeltaError::ZeroAmount(Operation::Mint));
        }
        contracts
            .env
            .assets
            .can_transfer_from(&underlying, &self.address, &caller, amount)?;

        let (earning_pool, env) = contracts.earning_pool_mut(&pool)?;
        self.credit(&beneficiary, minted)?;
        env.transfer_from(&underlying, &self.address, &caller, &self.address, amount)?;
        earning_pool.deposit(env, self.address, self.address, amount)?;

        let (reward_pool, env) = contracts.reward_pool_mut();
        reward_pool.mint_shares(env, self.address, beneficiary, minted)?;

        env.emit(self.address, Event::Transfer { from: Address::ZERO, to: beneficiary, amount: minted });
        env.emit(
            self.address,
            Event::Minted { payer: caller, beneficiary, underlying, amount },
        );
        info!(token = %self.address, payer = %caller, %beneficiary, %underlying, amount, minted, "minted");
        Ok(minted)
    }

    /// Burn `caller`'s balance worth `amount` of `underlying` and send the
    /// underlying, less the earning pool's withdraw fee, to `beneficiary`.
    /// Allowed while the underlying is paused. Returns the underlying sent.
    pub fn redeem(
        &mut self,
        contracts: &mut Contracts,
        caller: Address,
        beneficiary: Address,
        underlying: Address,
        amount: Amount,
    ) -> Result<Amount> {
        if amount == 0 {
            return Err(DeltaError::ZeroAmount(Operation::Redeem));
        }
        let pool = self.pool_for(&underlying)?;
        let burned = self.to_token_amount_ceil(&contracts.env, &underlying, amount)?;
        self.ensure_balance(&caller, burned)?;

        let (earning_pool, env) = contracts.earning_pool_mut(&pool)?;
        self.debit(&caller, burned)?;
        let sent = earning_pool.withdraw(env, self.address, beneficiary, amount)?;

        let (reward_pool, env) = contracts.reward_pool_mut();
        reward_pool.burn_shares(env, self.address, caller, burned)?;

        env.emit(self.address, Event::Transfer { from: caller, to: Address::ZERO, amount: burned });
        env.emit(
            self.address,
            Event::Redeemed { payer: caller, beneficiary, underlying, amount },
        );
        info!(token = %self.address, payer = %caller, %beneficiary, %underlying, amount, burned, sent, "redeemed");
        Ok(sent)
    }

    /// Exchange `amount_from` of `underlying_from` paid by `caller` for the
    /// same value of `underlying_to` sent to `beneficiary`, one to one after
    /// precision scaling. Pool-token balances and reward shares are not
    /// touched. Returns the `underlying_to` amount withdrawn.
    pub fn swap(
        &mut self,
        contracts: &mut Contracts,
        caller: Address,
        beneficiary: Address,
        underlying_from: Address,
        amount_from: Amount,
        underlying_to: Address,
    ) -> Result<Amount> {
        if amount_from == 0 {
            return Err(DeltaError::ZeroAmount(Operation::Swap));
        }
        let pool_from = self.pool_for(&underlying_from)?;
        let pool_to = self.pool_for(&underlying_to)?;
        self.ensure_not_paused(&underlying_from)?;

        let env = &contracts.env;
        let amount_to = scale_amount(
            amount_from,
            env.assets.decimals(&underlying_from)?,
            env.assets.decimals(&underlying_to)?,
        )?;
        if amount_to == 0 {
            return Err(DeltaError::ZeroAmount(Operation::Swap));
        }
        let liquidity = contracts.earning_pool(&pool_to)?.shares_of(&self.address);
        let liquidity = if pool_from == pool_to {
            checked_add(liquidity, amount_from)?
        } else {
            liquidity
        };
        if liquidity < amount_to {
            return Err(DeltaError::InsufficientLiquidity { required: amount_to, available: liquidity });
        }
        env.assets
            .can_transfer_from(&underlying_from, &self.address, &caller, amount_from)?;

        let (earning_pool, env) = contracts.earning_pool_mut(&pool_from)?;
        env.transfer_from(&underlying_from, &self.address, &caller, &self.address, amount_from)?;
        earning_pool.deposit(env, self.address, self.address, amount_from)?;

        let (earning_pool, env) = contracts.earning_pool_mut(&pool_to)?;
        let sent = earning_pool.withdraw(env, self.address, beneficiary, amount_to)?;

        env.emit(
            self.address,
            Event::Swapped {
                payer: caller,
                beneficiary,
                underlying_from,
                amount_from,
                underlying_to,
                amount_to,
            },
        );
        info!(
            token = %self.address,
            payer = %caller,
            %beneficiary,
            %underlying_from,
            amount_from,
            %underlying_to,
            amount_to,
            "swapped"
        );
        Ok(sent)
    }

    pub fn transfer(&mut self, contracts: &mut Contracts, caller: Address, to: Address, amount: Amount) -> Result<()> {
        self.move_balance(contracts, caller, to, amount)
    }

    /// Move `amount` from `from` to `to` against `spender`'s allowance
    pub fn transfer_from(
        &mut self,
        contracts: &mut Contracts,
        spender: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<()> {
        let allowance = self.allowance(&from, &spender);
        if spender != from && allowance < amount {
            return Err(DeltaError::InsufficientAllowance {
                asset: self.address,
                spender,
                required: amount,
                available: allowance,
            });
        }
        self.ensure_balance(&from, amount)?;

        if spender != from && allowance != UNLIMITED_ALLOWANCE {
            self.allowances.insert((from, spender), allowance - amount);
        }
        self.move_balance(contracts, from, to, amount)
    }

    pub fn approve(&mut self, env: &mut Env, caller: Address, spender: Address, amount: Amount) {
        self.allowances.insert((caller, spender), amount);
        env.emit(self.address, Event::Approval { owner: caller, spender, amount });
    }

    // === Owner operations ===

    /// Route `pool`'s underlying through it
    pub fn add_earning_pool(&mut self, contracts: &mut Contracts, caller: Address, pool: Address) -> Result<()> {
        self.ownable.ensure_owner(&caller)?;
        self.register_earning_pool(contracts, pool)
    }

    /// Block minting and swapping from `underlying`; redeem stays open
    pub fn pause(&mut self, env: &mut Env, caller: Address, underlying: Address) -> Result<()> {
        self.ownable.ensure_owner(&caller)?;
        self.paused.insert(underlying);
        env.emit(self.address, Event::Paused { underlying });
        info!(token = %self.address, %underlying, "underlying paused");
        Ok(())
    }

    pub fn unpause(&mut self, env: &mut Env, caller: Address, underlying: Address) -> Result<()> {
        self.ownable.ensure_owner(&caller)?;
        self.paused.remove(&underlying);
        env.emit(self.address, Event::Unpaused { underlying });
        info!(token = %self.address, %underlying, "underlying unpaused");
        Ok(())
    }

    pub fn set_name(&mut self, env: &mut Env, caller: Address, name: impl Into<String>) -> Result<()> {
        self.ownable.ensure_owner(&caller)?;
        let new = name.into();
        let old = std::mem::replace(&mut self.name, new.clone());
        env.emit(self.address, Event::NameChanged { old, new });
        Ok(())
    }

    pub fn set_symbol(&mut self, env: &mut Env, caller: Address, symbol: impl Into<String>) -> Result<()> {
        self.ownable.ensure_owner(&caller)?;
        let new = symbol.into();
        let old = std::mem::replace(&mut self.symbol, new.clone());
        env.emit(self.address, Event::SymbolChanged { old, new });
        Ok(())
    }

    pub fn transfer_ownership(&mut self, env: &mut Env, caller: Address, new_owner: Address) -> Result<()> {
        let previous = self.ownable.transfer_ownership(&caller, new_owner)?;
        env.emit(self.address, Event::OwnershipTransferred { previous, new: new_owner });
        Ok(())
    }

    // === Internals ===

    fn register_earning_pool(&mut self, contracts: &mut Contracts, pool: Address) -> Result<()> {
        let underlying = contracts.earning_pool(&pool)?.underlying();
        if self.earning_pools.contains_key(&underlying) {
            return Err(DeltaError::AlreadyRegistered(underlying));
        }

        self.earning_pools.insert(underlying, pool);
        self.underlyings.push(underlying);
        contracts
            .env
            .approve(&underlying, &self.address, &pool, UNLIMITED_ALLOWANCE)?;

        contracts
            .env
            .emit(self.address, Event::EarningPoolAdded { earning_pool: pool, underlying });
        info!(token = %self.address, %pool, %underlying, "earning pool added");
        Ok(())
    }

    fn pool_for(&self, underlying: &Address) -> Result<Address> {
        self.earning_pool_for(underlying)
            .ok_or(DeltaError::UnsupportedUnderlying(*underlying))
    }

    fn ensure_not_paused(&self, underlying: &Address) -> Result<()> {
        if self.is_paused(underlying) {
            return Err(DeltaError::UnderlyingPaused(*underlying));
        }
        Ok(())
    }

    fn ensure_balance(&self, account: &Address, amount: Amount) -> Result<()> {
        let available = self.balance_of(account);
        if available < amount {
            return Err(DeltaError::InsufficientBalance {
                asset: self.address,
                account: *account,
                required: amount,
                available,
            });
        }
        Ok(())
    }

    fn to_token_amount(&self, env: &Env, underlying: &Address, amount: Amount) -> Result<Amount> {
        scale_amount(amount, env.assets.decimals(underlying)?, self.decimals)
    }

    fn to_token_amount_ceil(&self, env: &Env, underlying: &Address, amount: Amount) -> Result<Amount> {
        scale_amount_ceil(amount, env.assets.decimals(underlying)?, self.decimals)
    }

    fn credit(&mut self, account: &Address, amount: Amount) -> Result<()> {
        let total_supply = checked_add(self.total_supply, amount)?;
        let balance = checked_add(self.balance_of(account), amount)?;
        self.balances.insert(*account, balance);
        self.total_supply = total_supply;
        Ok(())
    }

    fn debit(&mut self, account: &Address, amount: Amount) -> Result<()> {
        self.ensure_balance(account, amount)?;
        let total_supply = checked_sub(self.total_supply, amount)?;
        self.balances.insert(*account, self.balance_of(account) - amount);
        self.total_supply = total_supply;
        Ok(())
    }

    /// Ledger move plus the matching reward-share move, burn first
    fn move_balance(&mut self, contracts: &mut Contracts, from: Address, to: Address, amount: Amount) -> Result<()> {
        self.ensure_balance(&from, amount)?;

        self.balances.insert(from, self.balance_of(&from) - amount);
        let received = checked_add(self.balance_of(&to), amount)?;
        self.balances.insert(to, received);

        let (reward_pool, env) = contracts.reward_pool_mut();
        reward_pool.burn_shares(env, self.address, from, amount)?;
        reward_pool.mint_shares(env, self.address, to, amount)?;

        env.emit(self.address, Event::Transfer { from, to, amount });
        debug!(token = %self.address, %from, %to, amount, "transfer");
        Ok(())
    }
}
