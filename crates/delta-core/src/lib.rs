//! # Delta Core
//!
//! Shared primitives for the Delta multi-asset stable-value ledger.
//!
//! This crate provides the building blocks every pool component executes against:
//! - `Address` / `Amount` - identities and raw token amounts
//! - `AssetLedger` - balances and allowances of every fungible asset
//! - `YieldVenue` - the external interest-bearing position, with a simulator
//! - `Ownable` / `Managers` - owner and manager role tables
//! - `EventLog` - typed events of every state change
//! - `Env` - the world a call runs against, and `atomic` for all-or-nothing calls
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────┐      ┌────────────────┐
//!   │  Pool Token  │─────►│ Reward Pool    │
//!   └──────┬───────┘      └────────────────┘
//!          │ one per underlying
//!   ┌──────▼───────┐      ┌────────────────┐
//!   │ Earning Pool │─────►│ Yield Venue    │
//!   └──────────────┘      └────────────────┘
//!          all of them read and write Env
//! ```

pub mod asset;
pub mod auth;
pub mod clock;
pub mod env;
pub mod error;
pub mod event;
pub mod math;
pub mod types;
pub mod venue;

pub use asset::*;
pub use auth::*;
pub use clock::*;
pub use env::*;
pub use error::*;
pub use event::*;
pub use types::*;
pub use venue::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::asset::{AssetLedger, UNLIMITED_ALLOWANCE};
    pub use crate::auth::{Managers, Ownable};
    pub use crate::clock::Clock;
    pub use crate::env::{atomic, Env};
    pub use crate::error::{DeltaError, ErrorKind, Operation, Result};
    pub use crate::event::{Event, EventLog, EventRecord};
    pub use crate::math::MANTISSA_ONE;
    pub use crate::types::{Address, Amount};
    pub use crate::venue::{SimulatedVenue, YieldVenue};
}
