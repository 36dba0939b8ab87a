//! # Delta Earning
//!
//! Per-underlying vaults that park deposits in a yield venue.
//!
//! Shares are principal: one share per unit deposited. Venue interest and
//! retained withdraw fees accumulate as a separate earning bucket that an
//! external scheduler can sweep with `dispense_earning` at any time; the
//! call is a no-op until a recipient is set and the threshold is met.

pub mod pool;

pub use pool::{EarningPool, EarningPoolStats};
