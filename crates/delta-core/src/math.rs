//! Fixed-point and decimal-precision arithmetic
//!
//! Fractions are mantissas scaled by [`MANTISSA_ONE`] (1e18), independent of
//! the decimals of any asset. Products are formed in 256 bits so that
//! `amount * mantissa` never overflows before the division.

use crate::error::{DeltaError, Result};
use crate::types::Amount;
pub use primitive_types::U256;

/// 1.0 as an 18-decimal mantissa
pub const MANTISSA_ONE: u128 = 1_000_000_000_000_000_000;

/// Largest decimal precision whose unit fits in a `u128`
pub const MAX_DECIMALS: u8 = 38;

/// Narrow a 256-bit intermediate back to an amount
pub fn narrow(value: U256) -> Result<Amount> {
    if value.bits() > 128 {
        return Err(DeltaError::Overflow);
    }
    Ok(value.low_u128())
}

/// `a * b / denominator`, rounded down
pub fn mul_div(a: Amount, b: Amount, denominator: Amount) -> Result<Amount> {
    if denominator == 0 {
        return Err(DeltaError::Overflow);
    }
    narrow(U256::from(a) * U256::from(b) / U256::from(denominator))
}

/// `a * b / denominator`, rounded up
pub fn mul_div_ceil(a: Amount, b: Amount, denominator: Amount) -> Result<Amount> {
    if denominator == 0 {
        return Err(DeltaError::Overflow);
    }
    let product = U256::from(a) * U256::from(b);
    let denominator = U256::from(denominator);
    let mut quotient = product / denominator;
    if !(product % denominator).is_zero() {
        quotient += U256::one();
    }
    narrow(quotient)
}

/// Apply a mantissa fraction to an amount, rounded down
pub fn mul_mantissa(amount: Amount, mantissa: u128) -> Result<Amount> {
    mul_div(amount, mantissa, MANTISSA_ONE)
}

pub fn checked_add(a: Amount, b: Amount) -> Result<Amount> {
    a.checked_add(b).ok_or(DeltaError::Overflow)
}

pub fn checked_sub(a: Amount, b: Amount) -> Result<Amount> {
    a.checked_sub(b).ok_or(DeltaError::Overflow)
}

/// `10^decimals`
pub fn pow10(decimals: u8) -> Result<Amount> {
    10u128.checked_pow(decimals as u32).ok_or(DeltaError::Overflow)
}

/// Rescale `amount` from `from` decimals to `to` decimals, rounding down
pub fn scale_amount(amount: Amount, from: u8, to: u8) -> Result<Amount> {
    if to >= from {
        amount
            .checked_mul(pow10(to - from)?)
            .ok_or(DeltaError::Overflow)
    } else {
        Ok(amount / pow10(from - to)?)
    }
}

/// Rescale `amount` from `from` decimals to `to` decimals, rounding up
pub fn scale_amount_ceil(amount: Amount, from: u8, to: u8) -> Result<Amount> {
    if to >= from {
        scale_amount(amount, from, to)
    } else {
        let unit = pow10(from - to)?;
        let quotient = amount / unit;
        if amount % unit == 0 {
            Ok(quotient)
        } else {
            checked_add(quotient, 1)
        }
    }
}
