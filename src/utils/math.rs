//! Fixed-point arithmetic with explicit rounding direction.
//!
//! Every boundary between assets and shares, or between token units and USD
//! value, names its rounding direction at the call site. The convention is
//! protocol-favoring throughout: shares minted round down, shares burned
//! round up, debt owed rounds up, collateral released rounds down.
//!
//! All products are computed through a 256-bit intermediate so a `u128 * u128`
//! numerator can never silently truncate before the division.

use alloy_primitives::{U256, U512};

use crate::error::{Error, Result};
use crate::utils::constants::{MAX_TICK, TICK_BASE_WAD, WAD};

// ═══════════════════════════════════════════════════════════════════════════════
// ROUNDING
// ═══════════════════════════════════════════════════════════════════════════════

/// Direction precision loss is pushed in when a division is inexact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Truncate toward zero
    Down,
    /// Round away from zero
    Up,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CORE MUL-DIV
// ═══════════════════════════════════════════════════════════════════════════════

/// Computes `a * b / denominator` with a 256-bit intermediate product.
///
/// Fails with [`Error::DivisionByZero`] on a zero denominator and
/// [`Error::Overflow`] when the quotient does not fit in a `u128`.
pub fn mul_div(a: u128, b: u128, denominator: u128, rounding: Rounding) -> Result<u128> {
    if denominator == 0 {
        return Err(Error::DivisionByZero {
            operation: format!("({} * {}) / 0", a, b),
        });
    }

    let numerator = U256::from(a) * U256::from(b);
    let denom = U256::from(denominator);

    let quotient = match rounding {
        Rounding::Down => numerator / denom,
        Rounding::Up => (numerator + denom - U256::from(1u8)) / denom,
    };

    if quotient > U256::from(u128::MAX) {
        return Err(Error::Overflow {
            operation: format!("({} * {}) / {}", a, b, denominator),
        });
    }

    Ok(quotient.to::<u128>())
}

/// Computes `value * numer_a * numer_b / (denom_a * denom_b)` through a
/// 512-bit intermediate, rounding once at the end.
///
/// Used where folding two scale factors into one `mul_div` would either
/// overflow the factor product or truncate at an intermediate division.
pub fn mul_div_wide(
    value: u128,
    numer_a: u128,
    numer_b: u128,
    denom_a: u128,
    denom_b: u128,
    rounding: Rounding,
) -> Result<u128> {
    let denominator = U512::from(denom_a) * U512::from(denom_b);
    if denominator.is_zero() {
        return Err(Error::DivisionByZero {
            operation: format!("... / ({} * {})", denom_a, denom_b),
        });
    }

    let numerator = U512::from(value) * U512::from(numer_a) * U512::from(numer_b);
    let quotient = match rounding {
        Rounding::Down => numerator / denominator,
        Rounding::Up => (numerator + denominator - U512::from(1u8)) / denominator,
    };

    if quotient > U512::from(u128::MAX) {
        return Err(Error::Overflow {
            operation: "wide mul-div".into(),
        });
    }

    Ok(quotient.to::<u128>())
}

/// WAD-scaled multiplication, rounding down
pub fn w_mul_down(a: u128, b: u128) -> Result<u128> {
    mul_div(a, b, WAD, Rounding::Down)
}

/// WAD-scaled multiplication, rounding up
pub fn w_mul_up(a: u128, b: u128) -> Result<u128> {
    mul_div(a, b, WAD, Rounding::Up)
}

/// WAD-scaled division, rounding down
pub fn w_div_down(a: u128, b: u128) -> Result<u128> {
    mul_div(a, WAD, b, Rounding::Down)
}

/// WAD-scaled division, rounding up
pub fn w_div_up(a: u128, b: u128) -> Result<u128> {
    mul_div(a, WAD, b, Rounding::Up)
}

/// Subtraction floored at zero
pub fn zero_floor_sub(a: u128, b: u128) -> u128 {
    a.saturating_sub(b)
}

/// Checked addition mapped to [`Error::Overflow`]
pub fn checked_add(a: u128, b: u128) -> Result<u128> {
    a.checked_add(b).ok_or_else(|| Error::Overflow {
        operation: format!("{} + {}", a, b),
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// SHARE CONVERSIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Converts an asset amount to ledger shares.
///
/// On an empty ledger one asset unit converts to one WAD of shares, which is
/// what makes share balances WAD-scaled relative to raw token units.
pub fn assets_to_shares(
    assets: u128,
    total_assets: u128,
    total_shares: u128,
    rounding: Rounding,
) -> Result<u128> {
    if total_shares == 0 {
        return mul_div(assets, WAD, 1, rounding);
    }
    mul_div(assets, total_shares, total_assets, rounding)
}

/// Converts ledger shares back to an asset amount
pub fn shares_to_assets(
    shares: u128,
    total_assets: u128,
    total_shares: u128,
    rounding: Rounding,
) -> Result<u128> {
    if total_shares == 0 {
        return Ok(0);
    }
    mul_div(shares, total_assets, total_shares, rounding)
}

// ═══════════════════════════════════════════════════════════════════════════════
// USD VALUATION
// ═══════════════════════════════════════════════════════════════════════════════

/// `10^decimals` as u128; decimals are bounded at configuration time
pub fn pow10(decimals: u8) -> u128 {
    10u128.pow(decimals as u32)
}

/// Values `amount` raw token units at `price_wad` USD per whole token,
/// returning WAD-scaled USD
pub fn value_usd(amount: u128, price_wad: u128, decimals: u8, rounding: Rounding) -> Result<u128> {
    mul_div(amount, price_wad, pow10(decimals), rounding)
}

/// Converts a WAD-scaled USD value back to raw token units at `price_wad`
pub fn amount_from_usd(
    value_wad: u128,
    price_wad: u128,
    decimals: u8,
    rounding: Rounding,
) -> Result<u128> {
    mul_div(value_wad, pow10(decimals), price_wad, rounding)
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPONENTIATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Raises a WAD-scaled base to an integer power by binary exponentiation
pub fn pow_wad(base: u128, mut exp: u64) -> Result<u128> {
    let mut result = WAD;
    let mut acc = base;
    while exp > 0 {
        if exp & 1 == 1 {
            result = w_mul_down(result, acc)?;
        }
        exp >>= 1;
        if exp > 0 {
            acc = w_mul_down(acc, acc)?;
        }
    }
    Ok(result)
}

/// `1.0001^tick` in WAD; negative ticks take the reciprocal
pub fn tick_to_price_wad(tick: i64) -> Result<u128> {
    if tick.unsigned_abs() > MAX_TICK as u64 {
        return Err(Error::InvalidParameter {
            name: "tick".into(),
            reason: format!("magnitude {} exceeds {}", tick.unsigned_abs(), MAX_TICK),
        });
    }

    let magnitude = pow_wad(TICK_BASE_WAD, tick.unsigned_abs())?;
    if tick >= 0 {
        Ok(magnitude)
    } else {
        mul_div(WAD, WAD, magnitude, Rounding::Down)
    }
}
