//! Deployed component set
//!
//! The pool token never owns the pools it routes through; it addresses them
//! by address, the same way any other depositor would. [`Contracts`] holds
//! them together with the [`Env`] they execute against.

use delta_core::error::{DeltaError, Result};
use delta_core::{Address, Env};
use delta_earning::EarningPool;
use delta_rewards::{ManagedRewardPool, StakedRewardPool};
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
pub struct Contracts {
    pub env: Env,

    /// Mining pool mirroring pool-token balances
    pub reward_pool: ManagedRewardPool,

    earning_pools: BTreeMap<Address, EarningPool>,
    staking_pools: BTreeMap<Address, StakedRewardPool>,
}

impl Contracts {
    pub fn new(env: Env, reward_pool: ManagedRewardPool) -> Self {
        Self {
            env,
            reward_pool,
            earning_pools: BTreeMap::new(),
            staking_pools: BTreeMap::new(),
        }
    }

    // === Earning pools ===

    pub fn insert_earning_pool(&mut self, pool: EarningPool) -> Result<()> {
        let address = pool.address();
        if self.earning_pools.contains_key(&address) {
            return Err(DeltaError::InvalidParameter(format!(
                "earning pool already deployed at {address}"
            )));
        }
        self.earning_pools.insert(address, pool);
        Ok(())
    }

    pub fn earning_pool(&self, address: &Address) -> Result<&EarningPool> {
        self.earning_pools
            .get(address)
            .ok_or_else(|| unknown_pool("earning", address))
    }

    pub fn earning_pools(&self) -> impl Iterator<Item = &EarningPool> {
        self.earning_pools.values()
    }

    /// Borrow one earning pool together with the environment
    pub fn earning_pool_mut(&mut self, address: &Address) -> Result<(&mut EarningPool, &mut Env)> {
        let pool = self
            .earning_pools
            .get_mut(address)
            .ok_or_else(|| unknown_pool("earning", address))?;
        Ok((pool, &mut self.env))
    }

    // === Staking pools ===

    pub fn insert_staking_pool(&mut self, pool: StakedRewardPool) -> Result<()> {
        let address = pool.address();
        if self.staking_pools.contains_key(&address) {
            return Err(DeltaError::InvalidParameter(format!(
                "staking pool already deployed at {address}"
            )));
        }
        self.staking_pools.insert(address, pool);
        Ok(())
    }

    pub fn staking_pool(&self, address: &Address) -> Result<&StakedRewardPool> {
        self.staking_pools
            .get(address)
            .ok_or_else(|| unknown_pool("staking", address))
    }

    pub fn staking_pools(&self) -> impl Iterator<Item = &StakedRewardPool> {
        self.staking_pools.values()
    }

    pub fn staking_pool_mut(&mut self, address: &Address) -> Result<(&mut StakedRewardPool, &mut Env)> {
        let pool = self
            .staking_pools
            .get_mut(address)
            .ok_or_else(|| unknown_pool("staking", address))?;
        Ok((pool, &mut self.env))
    }

    /// Borrow the mining pool together with the environment
    pub fn reward_pool_mut(&mut self) -> (&mut ManagedRewardPool, &mut Env) {
        (&mut self.reward_pool, &mut self.env)
    }
}

fn unknown_pool(kind: &str, address: &Address) -> DeltaError {
    DeltaError::InvalidParameter(format!("no {kind} pool deployed at {address}"))
}
