//! # Delta Token
//!
//! The pool token router and the protocol facade around it.
//!
//! - `PoolToken` - mint, redeem, swap and transfer across several underlyings
//! - `Contracts` - the deployed pools and the environment they run in
//! - `Protocol` / `ProtocolHandle` - all-or-nothing calls, shared between threads
//! - `DeploymentConfig` - TOML description of a deployment

pub mod config;
pub mod contracts;
pub mod protocol;
pub mod token;

pub use config::DeploymentConfig;
pub use contracts::Contracts;
pub use protocol::{Protocol, ProtocolHandle, ProtocolStats};
pub use token::{PoolToken, PoolTokenStats};
