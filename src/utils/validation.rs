//! Input validation utilities for the isolend engine.
//!
//! Validation functions run before any state is touched so a rejected
//! operation leaves no partial writes behind.

use crate::error::{Error, Result};
use crate::utils::constants::{MAX_TOKEN_DECIMALS, WAD};

// ═══════════════════════════════════════════════════════════════════════════════
// AMOUNT VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate that an amount is non-zero
pub fn validate_non_zero(amount: u128) -> Result<()> {
    if amount == 0 {
        return Err(Error::ZeroAmount);
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARAMETER VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate that a WAD-scaled fraction does not exceed 1.0
pub fn validate_wad_fraction(value: u128, name: &str) -> Result<()> {
    if value > WAD {
        return Err(Error::InvalidParameter {
            name: name.into(),
            reason: format!("{} exceeds 1 WAD", value),
        });
    }
    Ok(())
}

/// Validate token decimals are within the supported range
pub fn validate_decimals(decimals: u8, name: &str) -> Result<()> {
    if decimals > MAX_TOKEN_DECIMALS {
        return Err(Error::InvalidParameter {
            name: name.into(),
            reason: format!("{} decimals exceed maximum {}", decimals, MAX_TOKEN_DECIMALS),
        });
    }
    Ok(())
}

/// Validate a duration is non-zero
pub fn validate_duration(seconds: u64, name: &str) -> Result<()> {
    if seconds == 0 {
        return Err(Error::InvalidParameter {
            name: name.into(),
            reason: "duration cannot be zero".into(),
        });
    }
    Ok(())
}
