//! # Delta Rewards
//!
//! Share-proportional reward distribution.
//!
//! - `RewardAccumulator` - the reward-per-share accumulator over a shares ledger
//! - `ManagedRewardPool` - shares written by promoted managers (the pool token)
//! - `StakedRewardPool` - shares minted 1:1 against a deposited stake asset
//!
//! Both pools support the two emission modes in [`Emission`]: a per-second
//! schedule funded with `notify_reward_amount`, or a fixed amount per block.
//! Every share change settles the affected account first, so rewards accrued
//! at the old share count are never lost or diluted.

pub mod accumulator;
pub mod managed;
pub mod pool;
pub mod staked;

pub use accumulator::{Emission, RewardAccumulator};
pub use managed::ManagedRewardPool;
pub use pool::{RewardPool, RewardPoolStats};
pub use staked::StakedRewardPool;
