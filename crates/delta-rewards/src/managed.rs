//! # Managed Reward Pool
//!
//! Shares are written only by promoted managers, typically a pool token that
//! mirrors its own balances into the pool on every balance change.

use crate::accumulator::Emission;
use crate::pool::RewardPool;
use delta_core::error::Result;
use delta_core::{Address, Amount, Env, Event, Managers};
use std::ops::{Deref, DerefMut};
use tracing::{debug, info};

#[derive(Clone, Debug)]
pub struct ManagedRewardPool {
    pool: RewardPool,
    managers: Managers,
}

impl ManagedRewardPool {
    pub fn new(
        env: &Env,
        address: Address,
        owner: Address,
        reward_token: Address,
        emission: Emission,
        rate: Amount,
    ) -> Result<Self> {
        Ok(Self {
            pool: RewardPool::new(env, address, owner, reward_token, None, emission, rate)?,
            managers: Managers::new(),
        })
    }

    pub fn is_manager(&self, account: &Address) -> bool {
        self.managers.contains(account)
    }

    pub fn promote(&mut self, env: &mut Env, caller: Address, manager: Address) -> Result<()> {
        self.pool.ensure_owner(&caller)?;
        if self.managers.promote(manager) {
            env.emit(self.pool.address(), Event::Promoted { manager });
            info!(pool = %self.pool.address(), %manager, "manager promoted");
        }
        Ok(())
    }

    pub fn demote(&mut self, env: &mut Env, caller: Address, manager: Address) -> Result<()> {
        self.pool.ensure_owner(&caller)?;
        if self.managers.demote(&manager) {
            env.emit(self.pool.address(), Event::Demoted { manager });
            info!(pool = %self.pool.address(), %manager, "manager demoted");
        }
        Ok(())
    }

    /// Settle `account`, then grow its shares
    pub fn mint_shares(&mut self, env: &mut Env, caller: Address, account: Address, amount: Amount) -> Result<()> {
        self.managers.ensure_manager(&caller)?;
        self.pool.mint_shares(env, &account, amount)?;
        env.emit(self.pool.address(), Event::SharesMinted { account, amount });
        debug!(pool = %self.pool.address(), %account, amount, "shares minted");
        Ok(())
    }

    /// Settle `account`, then shrink its shares
    pub fn burn_shares(&mut self, env: &mut Env, caller: Address, account: Address, amount: Amount) -> Result<()> {
        self.managers.ensure_manager(&caller)?;
        self.pool.burn_shares(env, &account, amount)?;
        env.emit(self.pool.address(), Event::SharesBurned { account, amount });
        debug!(pool = %self.pool.address(), %account, amount, "shares burned");
        Ok(())
    }
}

impl Deref for ManagedRewardPool {
    type Target = RewardPool;

    fn deref(&self) -> &RewardPool {
        &self.pool
    }
}

impl DerefMut for ManagedRewardPool {
    fn deref_mut(&mut self) -> &mut RewardPool {
        &mut self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delta_core::math::MANTISSA_ONE;
    use delta_core::{Clock, DeltaError};

    const ONE: u128 = MANTISSA_ONE;

    struct Fixture {
        env: Env,
        pool: ManagedRewardPool,
        admin: Address,
        manager: Address,
        reward: Address,
    }

    /// 100 reward tokens per block
    fn fixture() -> Fixture {
        let mut env = Env::new(Clock::new(1_000, 100));
        let reward = Address::from_label("RWD");
        env.assets.register(reward, "RWD", 18).unwrap();
        let admin = Address::from_label("admin");
        let pool = ManagedRewardPool::new(
            &env,
            Address::from_label("managed-reward-pool"),
            admin,
            reward,
            Emission::PerBlock,
            100 * ONE,
        )
        .unwrap();
        Fixture { env, pool, admin, manager: Address::from_label("manager"), reward }
    }

    #[test]
    fn test_only_owner_can_promote_and_demote() {
        let mut f = fixture();
        assert_eq!(
            f.pool.promote(&mut f.env, f.manager, f.manager),
            Err(DeltaError::NotOwner(f.manager))
        );
        f.pool.promote(&mut f.env, f.admin, f.manager).unwrap();
        assert!(f.pool.is_manager(&f.manager));
        assert!(f.env.events.contains(f.pool.address(), &Event::Promoted { manager: f.manager }));

        assert!(f.pool.demote(&mut f.env, f.manager, f.manager).is_err());
        f.pool.demote(&mut f.env, f.admin, f.manager).unwrap();
        assert!(!f.pool.is_manager(&f.manager));
        assert!(f.env.events.contains(f.pool.address(), &Event::Demoted { manager: f.manager }));
    }

    #[test]
    fn test_only_manager_can_mint_and_burn() {
        let mut f = fixture();
        let user = Address::from_label("user");
        f.pool.promote(&mut f.env, f.admin, f.manager).unwrap();

        assert_eq!(
            f.pool.mint_shares(&mut f.env, f.admin, user, 100),
            Err(DeltaError::NotManager(f.admin))
        );
        f.pool.mint_shares(&mut f.env, f.manager, user, 100).unwrap();
        assert_eq!(f.pool.shares_of(&user), 100);

        assert!(f.pool.burn_shares(&mut f.env, f.admin, user, 100).is_err());
        f.pool.burn_shares(&mut f.env, f.manager, user, 100).unwrap();
        assert_eq!(f.pool.shares_of(&user), 0);
    }

    #[test]
    fn test_block_rewards_scenario() {
        let mut f = fixture();
        let (u1, u2, u3) = (
            Address::from_label("user1"),
            Address::from_label("user2"),
            Address::from_label("user3"),
        );
        f.pool.promote(&mut f.env, f.admin, f.manager).unwrap();
        f.env.mint_asset(&f.reward, &f.pool.address(), 10_000 * ONE).unwrap();

        f.pool.mint_shares(&mut f.env, f.manager, u1, ONE).unwrap();
        f.env.mine(1, 12);
        assert_eq!(f.pool.earned(&f.env, &u1).unwrap(), 100 * ONE);
        f.env.mine(1, 12);
        assert_eq!(f.pool.earned(&f.env, &u1).unwrap(), 200 * ONE);

        f.pool.mint_shares(&mut f.env, f.manager, u2, ONE).unwrap();
        f.pool.mint_shares(&mut f.env, f.manager, u3, 8 * ONE).unwrap();
        f.env.mine(1, 12);
        assert_eq!(f.pool.earned(&f.env, &u1).unwrap(), 210 * ONE);
        assert_eq!(f.pool.earned(&f.env, &u2).unwrap(), 10 * ONE);
        assert_eq!(f.pool.earned(&f.env, &u3).unwrap(), 80 * ONE);
        assert_eq!(f.pool.total_rewards_emitted(&f.env).unwrap(), 300 * ONE);

        assert_eq!(f.pool.claim(&mut f.env, u3).unwrap(), 80 * ONE);
        assert_eq!(f.env.balance_of(&f.reward, &u3), 80 * ONE);
        assert_eq!(f.pool.claim(&mut f.env, u3).unwrap(), 0);
    }

    #[test]
    fn test_rate_setters_follow_emission_mode() {
        let mut f = fixture();
        assert_eq!(
            f.pool.set_rewards_per_second(&mut f.env, f.admin, 1),
            Err(DeltaError::EmissionMismatch("set_rewards_per_second"))
        );
        assert!(f.pool.set_rewards_per_block(&mut f.env, f.manager, 1).is_err());
        f.pool.set_rewards_per_block(&mut f.env, f.admin, 50 * ONE).unwrap();
        assert_eq!(f.pool.accumulator().rate(), 50 * ONE);
        assert!(f.env.events.contains(
            f.pool.address(),
            &Event::RewardRateChanged { old: 100 * ONE, new: 50 * ONE }
        ));
    }

    #[test]
    fn test_withdraw_remaining_keeps_mined_rewards() {
        let mut f = fixture();
        let user = Address::from_label("user");
        f.pool.promote(&mut f.env, f.admin, f.manager).unwrap();
        f.env.mint_asset(&f.reward, &f.pool.address(), 1_000 * ONE).unwrap();
        f.pool.mint_shares(&mut f.env, f.manager, user, ONE).unwrap();
        f.env.mine(3, 12);

        assert!(f.pool.withdraw_remaining_rewards(&mut f.env, f.manager).is_err());
        assert_eq!(f.pool.withdraw_remaining_rewards(&mut f.env, f.admin).unwrap(), 700 * ONE);
        assert_eq!(f.env.balance_of(&f.reward, &f.admin), 700 * ONE);

        // mined but unclaimed rewards stay claimable
        f.env.mine(5, 12);
        assert_eq!(f.pool.claim(&mut f.env, user).unwrap(), 300 * ONE);
    }
}
