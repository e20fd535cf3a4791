//! Market risk parameters and the per-market ledger totals.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::constants::{
    DEFAULT_CLOSE_FACTOR, DEFAULT_LIQUIDATION_PENALTY, DEFAULT_LIQUIDATION_THRESHOLD, DEFAULT_LTV,
    WAD,
};
use crate::utils::math::zero_floor_sub;
use crate::utils::validation::validate_wad_fraction;

// ═══════════════════════════════════════════════════════════════════════════════
// MARKET PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Risk parameters of one isolated market, WAD-scaled fractions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketParams {
    /// Maximum borrow as a fraction of collateral value at borrow time
    pub ltv: u128,
    /// Health-factor denominator ratio; stricter than the LTV
    pub liquidation_threshold: u128,
    /// Bonus fraction of collateral awarded to liquidators
    pub liquidation_penalty: u128,
    /// Maximum fraction of a position's debt liquidatable per auction
    pub close_factor: u128,
}

impl Default for MarketParams {
    fn default() -> Self {
        Self {
            ltv: DEFAULT_LTV,
            liquidation_threshold: DEFAULT_LIQUIDATION_THRESHOLD,
            liquidation_penalty: DEFAULT_LIQUIDATION_PENALTY,
            close_factor: DEFAULT_CLOSE_FACTOR,
        }
    }
}

impl MarketParams {
    /// Validate parameter consistency
    pub fn validate(&self) -> Result<()> {
        validate_wad_fraction(self.ltv, "ltv")?;
        validate_wad_fraction(self.liquidation_threshold, "liquidation_threshold")?;
        validate_wad_fraction(self.liquidation_penalty, "liquidation_penalty")?;
        validate_wad_fraction(self.close_factor, "close_factor")?;

        if self.ltv > self.liquidation_threshold {
            return Err(Error::InvalidParameter {
                name: "ltv".into(),
                reason: "ltv must not exceed the liquidation threshold".into(),
            });
        }
        if self.liquidation_threshold == 0 {
            return Err(Error::InvalidParameter {
                name: "liquidation_threshold".into(),
                reason: "cannot be zero".into(),
            });
        }
        Ok(())
    }

    /// Builder-style LTV override (for tests and market tuning)
    pub fn with_ltv(mut self, ltv: u128) -> Self {
        self.ltv = ltv;
        self
    }

    /// Builder-style close-factor override
    pub fn with_close_factor(mut self, close_factor: u128) -> Self {
        self.close_factor = close_factor;
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// The mutable ledger totals of one isolated market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketState {
    /// Assets supplied to the lending side
    pub total_supply_assets: u128,
    /// WAD-scaled shares representing supplier claims
    pub total_supply_shares: u128,
    /// Assets owed by borrowers
    pub total_borrow_assets: u128,
    /// WAD-scaled shares representing borrower debt
    pub total_borrow_shares: u128,
    /// Cumulative per-share interest multiplier, starts at 1 WAD and never
    /// decreases
    pub borrow_index: u128,
    /// Collateral held across all positions
    pub total_collateral: u128,
    /// Accrued interest retained by the protocol
    pub total_reserves: u128,
    /// Timestamp interest was last accrued at
    pub last_accrual_time: u64,
}

impl MarketState {
    /// Fresh ledger at the given timestamp
    pub fn new(now: u64) -> Self {
        Self {
            total_supply_assets: 0,
            total_supply_shares: 0,
            total_borrow_assets: 0,
            total_borrow_shares: 0,
            borrow_index: WAD,
            total_collateral: 0,
            total_reserves: 0,
            last_accrual_time: now,
        }
    }

    /// Un-borrowed assets available for withdrawal or new borrows
    pub fn liquidity(&self) -> u128 {
        zero_floor_sub(self.total_supply_assets, self.total_borrow_assets)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SNAPSHOT
// ═══════════════════════════════════════════════════════════════════════════════

/// Read-only summary of a market's ledger for monitoring callers
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Assets supplied
    pub total_supply_assets: u128,
    /// Supplier shares outstanding
    pub total_supply_shares: u128,
    /// Assets borrowed
    pub total_borrow_assets: u128,
    /// Borrower shares outstanding
    pub total_borrow_shares: u128,
    /// Cumulative borrow index
    pub borrow_index: u128,
    /// Collateral held
    pub total_collateral: u128,
    /// Protocol reserves
    pub total_reserves: u128,
    /// Available liquidity
    pub liquidity: u128,
    /// Current utilization, WAD-scaled
    pub utilization: u128,
    /// Last accrual timestamp
    pub last_accrual_time: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_valid() {
        assert!(MarketParams::default().validate().is_ok());
    }

    #[test]
    fn test_ltv_must_not_exceed_threshold() {
        let params = MarketParams::default().with_ltv(9 * WAD / 10);
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_fractions_bounded_by_wad() {
        let mut params = MarketParams::default();
        params.close_factor = WAD + 1;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_fresh_state() {
        let state = MarketState::new(1_000);
        assert_eq!(state.borrow_index, WAD);
        assert_eq!(state.last_accrual_time, 1_000);
        assert_eq!(state.liquidity(), 0);
    }

    #[test]
    fn test_liquidity_floors_at_zero() {
        let mut state = MarketState::new(0);
        state.total_supply_assets = 100;
        state.total_borrow_assets = 40;
        assert_eq!(state.liquidity(), 60);

        state.total_borrow_assets = 150;
        assert_eq!(state.liquidity(), 0);
    }
}
