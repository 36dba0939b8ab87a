//! Error types for Delta ledger operations

use crate::types::{Address, Amount};
use thiserror::Error;

/// Result type alias for Delta operations
pub type Result<T> = std::result::Result<T, DeltaError>;

/// Operation named in zero-amount rejections
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Deposit,
    Withdraw,
    Mint,
    Redeem,
    Swap,
    Stake,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
            Self::Mint => "mint",
            Self::Redeem => "redeem",
            Self::Swap => "swap amount",
            Self::Stake => "stake",
        };
        f.write_str(name)
    }
}

/// Failure classes callers can branch on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input: zero amounts, unsupported or paused underlyings
    Validation,
    /// Caller lacks shares, tokens, allowance or the pool lacks liquidity
    Balance,
    /// Caller is not the owner or a manager
    Authorization,
    /// Invalid deployment or parameter values
    Configuration,
    /// Checked arithmetic failed
    Arithmetic,
}

/// Errors that can occur in Delta ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeltaError {
    // === Input validation ===
    /// Amount must be non-zero
    #[error("{0} must be greater than 0")]
    ZeroAmount(Operation),

    /// Underlying has no registered earning pool
    #[error("underlying is not supported: {0}")]
    UnsupportedUnderlying(Address),

    /// Underlying is paused for entry
    #[error("underlying is paused: {0}")]
    UnderlyingPaused(Address),

    /// Earning pool already registered for this underlying
    #[error("earning pool already registered for underlying: {0}")]
    AlreadyRegistered(Address),

    /// Asset is not known to the ledger
    #[error("unknown asset: {0}")]
    UnknownAsset(Address),

    /// Asset is already registered in the ledger
    #[error("asset already exists: {0}")]
    AssetExists(Address),

    /// Venue is not known to the environment
    #[error("unknown yield venue: {0}")]
    UnknownVenue(Address),

    /// Operation is not available for the configured emission mode
    #[error("emission mode does not support {0}")]
    EmissionMismatch(&'static str),

    /// Staking opens at `start`
    #[error("pool not started: opens at {start}, now {now}")]
    NotStarted { start: u64, now: u64 },

    // === Insufficient balance ===
    /// Account lacks asset balance
    #[error("insufficient balance of {asset} for {account}: need {required}, have {available}")]
    InsufficientBalance {
        asset: Address,
        account: Address,
        required: Amount,
        available: Amount,
    },

    /// Spender lacks allowance
    #[error("insufficient allowance of {asset} for {spender}: need {required}, have {available}")]
    InsufficientAllowance {
        asset: Address,
        spender: Address,
        required: Amount,
        available: Amount,
    },

    /// Account lacks pool shares
    #[error("insufficient shares: need {required}, have {available}")]
    InsufficientShares { required: Amount, available: Amount },

    /// Destination pool cannot cover a swap
    #[error("insufficient underlyingTo for swap: need {required}, have {available}")]
    InsufficientLiquidity { required: Amount, available: Amount },

    /// Venue position cannot cover a redemption
    #[error("yield venue cannot redeem {required}: position worth {available}")]
    VenueShortfall { required: Amount, available: Amount },

    /// Reward rate would outrun the funded balance
    #[error("provided reward too high: need {required}, have {available}")]
    RewardTooHigh { required: Amount, available: Amount },

    // === Authorization ===
    /// Caller is not the owner
    #[error("caller is not the owner: {0}")]
    NotOwner(Address),

    /// Caller is not a promoted manager
    #[error("caller is not a manager: {0}")]
    NotManager(Address),

    // === Configuration ===
    /// Withdraw fee factor must be below one
    #[error("withdraw fee factor {0} must be less than 1e18")]
    InvalidFeeFactor(Amount),

    /// Invalid parameter value
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Deployment configuration rejected
    #[error("configuration error: {0}")]
    Config(String),

    // === Arithmetic ===
    /// Checked arithmetic overflowed
    #[error("arithmetic overflow")]
    Overflow,
}

impl DeltaError {
    /// Stable numeric code for API responses
    pub fn code(&self) -> u32 {
        match self {
            Self::ZeroAmount(_) => 1001,
            Self::UnsupportedUnderlying(_) => 1002,
            Self::UnderlyingPaused(_) => 1003,
            Self::AlreadyRegistered(_) | Self::AssetExists(_) => 1004,
            Self::UnknownAsset(_) | Self::UnknownVenue(_) => 1005,
            Self::EmissionMismatch(_) => 1006,
            Self::NotStarted { .. } => 1007,
            Self::InsufficientBalance { .. } => 2001,
            Self::InsufficientAllowance { .. } => 2002,
            Self::InsufficientShares { .. } => 2003,
            Self::InsufficientLiquidity { .. } => 2004,
            Self::VenueShortfall { .. } => 2005,
            Self::RewardTooHigh { .. } => 2006,
            Self::NotOwner(_) => 3001,
            Self::NotManager(_) => 3002,
            Self::InvalidFeeFactor(_) => 4001,
            Self::InvalidParameter(_) => 4002,
            Self::Config(_) => 4003,
            Self::Overflow => 5001,
        }
    }

    /// Failure class of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ZeroAmount(_)
            | Self::UnsupportedUnderlying(_)
            | Self::UnderlyingPaused(_)
            | Self::AlreadyRegistered(_)
            | Self::AssetExists(_)
            | Self::UnknownAsset(_)
            | Self::UnknownVenue(_)
            | Self::EmissionMismatch(_)
            | Self::NotStarted { .. } => ErrorKind::Validation,
            Self::InsufficientBalance { .. }
            | Self::InsufficientAllowance { .. }
            | Self::InsufficientShares { .. }
            | Self::InsufficientLiquidity { .. }
            | Self::VenueShortfall { .. }
            | Self::RewardTooHigh { .. } => ErrorKind::Balance,
            Self::NotOwner(_) | Self::NotManager(_) => ErrorKind::Authorization,
            Self::InvalidFeeFactor(_) | Self::InvalidParameter(_) | Self::Config(_) => {
                ErrorKind::Configuration
            }
            Self::Overflow => ErrorKind::Arithmetic,
        }
    }
}
