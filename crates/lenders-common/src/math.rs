//! Checked U256 arithmetic
//!
//! All amounts are base units scaled by [`WAD`]. Every helper maps overflow or
//! underflow to [`LendingError::Overflow`].

use alloy_primitives::U256;

use crate::error::{LendingError, Result};

/// 10^18, one whole asset unit
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Basis points denominator
pub const BPS: U256 = U256::from_limbs([10_000, 0, 0, 0]);

/// Whole units to base units (`n · 10^18`)
pub fn units(n: u64) -> U256 {
    U256::from(n) * WAD
}

/// Fractional whole units to base units, e.g. `units_frac(815, 1)` is 81.5
pub fn units_frac(mantissa: u64, decimals: u8) -> U256 {
    U256::from(mantissa) * WAD / U256::from(10u64).pow(U256::from(decimals))
}

#[inline]
pub fn add(a: U256, b: U256) -> Result<U256> {
    a.checked_add(b).ok_or(LendingError::Overflow)
}

#[inline]
pub fn sub(a: U256, b: U256) -> Result<U256> {
    a.checked_sub(b).ok_or(LendingError::Overflow)
}

#[inline]
pub fn mul(a: U256, b: U256) -> Result<U256> {
    a.checked_mul(b).ok_or(LendingError::Overflow)
}

/// Floor division; a zero divisor is treated as overflow
#[inline]
pub fn div(a: U256, b: U256) -> Result<U256> {
    a.checked_div(b).ok_or(LendingError::Overflow)
}

/// `a · b / c` with a single floor at the end
pub fn mul_div(a: U256, b: U256, c: U256) -> Result<U256> {
    div(mul(a, b)?, c)
}

/// `used / total` in basis points, zero for an empty pool
pub fn utilization_bps(used: U256, total: U256) -> Result<U256> {
    if total.is_zero() {
        return Ok(U256::ZERO);
    }
    mul_div(used, BPS, total)
}
