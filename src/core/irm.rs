//! Kinked utilization-driven interest-rate model.
//!
//! A pure function of the ledger totals: below the kink the borrow rate
//! climbs at `slope_below`, above it at `slope_above`. The supply rate is the
//! borrow rate scaled by utilization and net of the reserve factor.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::utils::constants::{SECONDS_PER_YEAR, WAD};
use crate::utils::math::{w_div_down, w_mul_down, checked_add};
use crate::utils::validation::validate_wad_fraction;

/// Borrow utilization of a ledger: `total_borrows / total_supply`, WAD-scaled.
/// Zero when nothing is supplied.
pub fn utilization(total_supply: u128, total_borrows: u128) -> Result<u128> {
    if total_supply == 0 {
        return Ok(0);
    }
    w_div_down(total_borrows, total_supply)
}

/// Kinked interest-rate model. All fields are WAD-scaled; rates are
/// per-second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestRateModel {
    /// Rate at zero utilization
    base_rate: u128,
    /// Rate slope below the kink
    slope_below: u128,
    /// Rate slope above the kink
    slope_above: u128,
    /// Utilization breakpoint
    kink: u128,
    /// Fraction of accrued interest retained by the protocol
    reserve_factor: u128,
}

impl InterestRateModel {
    /// Create a model from per-second WAD rates.
    ///
    /// Fails if the kink or the reserve factor exceed 1 WAD.
    pub fn new(
        base_rate: u128,
        slope_below: u128,
        slope_above: u128,
        kink: u128,
        reserve_factor: u128,
    ) -> Result<Self> {
        validate_wad_fraction(kink, "kink")?;
        validate_wad_fraction(reserve_factor, "reserve_factor")?;
        Ok(Self {
            base_rate,
            slope_below,
            slope_above,
            kink,
            reserve_factor,
        })
    }

    /// Create a model from annualized WAD rates
    pub fn from_annual(
        base_rate: u128,
        slope_below: u128,
        slope_above: u128,
        kink: u128,
        reserve_factor: u128,
    ) -> Result<Self> {
        let per_second = |annual: u128| annual / SECONDS_PER_YEAR as u128;
        Self::new(
            per_second(base_rate),
            per_second(slope_below),
            per_second(slope_above),
            kink,
            reserve_factor,
        )
    }

    /// Per-second borrow rate at the given ledger totals
    pub fn borrow_rate(&self, total_supply: u128, total_borrows: u128) -> Result<u128> {
        let util = utilization(total_supply, total_borrows)?;

        if util <= self.kink {
            checked_add(self.base_rate, w_mul_down(util, self.slope_below)?)
        } else {
            let at_kink = checked_add(self.base_rate, w_mul_down(self.kink, self.slope_below)?)?;
            let excess = w_mul_down(util - self.kink, self.slope_above)?;
            checked_add(at_kink, excess)
        }
    }

    /// Per-second supply rate: `borrow_rate * utilization * (1 - reserve_factor)`
    pub fn supply_rate(&self, total_supply: u128, total_borrows: u128) -> Result<u128> {
        let rate = self.borrow_rate(total_supply, total_borrows)?;
        let util = utilization(total_supply, total_borrows)?;
        w_mul_down(w_mul_down(rate, util)?, WAD - self.reserve_factor)
    }

    /// Fraction of accrued interest retained as reserves
    pub fn reserve_factor(&self) -> u128 {
        self.reserve_factor
    }

    /// Utilization breakpoint
    pub fn kink(&self) -> u128 {
        self.kink
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> InterestRateModel {
        // 2% base, 10% below-kink slope, 100% above-kink slope, 80% kink,
        // 10% reserve factor
        InterestRateModel::from_annual(
            WAD / 50,
            WAD / 10,
            WAD,
            8 * WAD / 10,
            WAD / 10,
        )
        .unwrap()
    }

    #[test]
    fn test_kink_bound_enforced() {
        assert!(InterestRateModel::new(0, 0, 0, WAD + 1, 0).is_err());
        assert!(InterestRateModel::new(0, 0, 0, WAD, 0).is_ok());
        assert!(InterestRateModel::new(0, 0, 0, WAD, WAD + 1).is_err());
    }

    #[test]
    fn test_utilization() {
        assert_eq!(utilization(0, 0).unwrap(), 0);
        assert_eq!(utilization(1000, 0).unwrap(), 0);
        assert_eq!(utilization(1000, 500).unwrap(), WAD / 2);
        assert_eq!(utilization(1000, 1000).unwrap(), WAD);
    }

    #[test]
    fn test_borrow_rate_at_zero_utilization_is_base() {
        let m = model();
        let base = m.borrow_rate(1_000_000, 0).unwrap();
        assert_eq!(base, (WAD / 50) / SECONDS_PER_YEAR as u128);
    }

    #[test]
    fn test_borrow_rate_monotone_in_utilization() {
        let m = model();
        let low = m.borrow_rate(1_000_000, 100_000).unwrap();
        let mid = m.borrow_rate(1_000_000, 500_000).unwrap();
        let high = m.borrow_rate(1_000_000, 950_000).unwrap();
        assert!(low < mid);
        assert!(mid < high);
    }

    #[test]
    fn test_slope_steepens_above_kink() {
        let m = model();
        // Equal utilization steps straddling the kink: the step above the
        // kink must raise the rate by more than the step below it
        let at_70 = m.borrow_rate(1_000_000, 700_000).unwrap();
        let at_80 = m.borrow_rate(1_000_000, 800_000).unwrap();
        let at_90 = m.borrow_rate(1_000_000, 900_000).unwrap();
        assert!(at_90 - at_80 > at_80 - at_70);
    }

    #[test]
    fn test_supply_rate_below_borrow_rate() {
        let m = model();
        let borrow = m.borrow_rate(1_000_000, 500_000).unwrap();
        let supply = m.supply_rate(1_000_000, 500_000).unwrap();
        // Half utilization and a 10% reserve cut
        assert!(supply < borrow / 2 + 1);
        assert!(supply > 0);
    }
}
