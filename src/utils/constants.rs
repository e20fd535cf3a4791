//! Engine constants and magic numbers.
//!
//! All engine-wide constants are defined here for easy auditing and
//! modification.

// ═══════════════════════════════════════════════════════════════════════════════
// FIXED-POINT SCALES
// ═══════════════════════════════════════════════════════════════════════════════

/// 18-decimal fixed-point unit; 1.0 is represented as 10^18
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Basis points divisor (10000 = 100%)
pub const BPS_DIVISOR: u128 = 10_000;

/// Seconds in a (non-leap) year, used to convert annual rates to per-second
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// Sentinel health factor for positions with zero debt
pub const HEALTH_FACTOR_INFINITE: u128 = u128::MAX;

/// Maximum token decimals the engine accepts
pub const MAX_TOKEN_DECIMALS: u8 = 30;

// ═══════════════════════════════════════════════════════════════════════════════
// ORACLE CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum allowed deviation between primary and fallback price - 5%
pub const MAX_PRICE_DEVIATION_BPS: u128 = 500;

/// Default grace window after the liveness feed comes back up - 1 hour
pub const DEFAULT_LIVENESS_GRACE_SECS: u64 = 3600;

/// Tick base for the fallback TWAP (1.0001 in WAD)
pub const TICK_BASE_WAD: u128 = 1_000_100_000_000_000_000;

/// Largest tick magnitude the TWAP synthesis accepts
pub const MAX_TICK: i64 = 887_272;

// ═══════════════════════════════════════════════════════════════════════════════
// AUCTION CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default auction duration - 20 minutes
pub const DEFAULT_AUCTION_DURATION_SECS: u64 = 1200;

/// Default start premium over the oracle reference price - 105%
pub const DEFAULT_START_PREMIUM: u128 = 1_050_000_000_000_000_000;

/// Default end discount under the oracle reference price - 95%
pub const DEFAULT_END_DISCOUNT: u128 = 950_000_000_000_000_000;

// ═══════════════════════════════════════════════════════════════════════════════
// RISK PARAMETER DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default maximum loan-to-value at borrow time - 75%
pub const DEFAULT_LTV: u128 = 750_000_000_000_000_000;

/// Default liquidation threshold - 80%
pub const DEFAULT_LIQUIDATION_THRESHOLD: u128 = 800_000_000_000_000_000;

/// Default liquidation penalty awarded to liquidators - 5%
pub const DEFAULT_LIQUIDATION_PENALTY: u128 = 50_000_000_000_000_000;

/// Default close factor: fraction of debt liquidatable per auction - 50%
pub const DEFAULT_CLOSE_FACTOR: u128 = 500_000_000_000_000_000;

// ═══════════════════════════════════════════════════════════════════════════════
// BOOKKEEPING
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum auction events kept in the engine's in-memory history
pub const MAX_EVENT_HISTORY: usize = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wad_scale() {
        assert_eq!(WAD, 10u128.pow(18));
        assert_eq!(TICK_BASE_WAD, WAD + WAD / 10_000);
    }

    #[test]
    fn test_risk_defaults_ordered() {
        assert!(DEFAULT_LTV < DEFAULT_LIQUIDATION_THRESHOLD);
        assert!(DEFAULT_LIQUIDATION_THRESHOLD < WAD);
        assert!(DEFAULT_LIQUIDATION_PENALTY < WAD);
        assert!(DEFAULT_CLOSE_FACTOR <= WAD);
    }

    #[test]
    fn test_auction_defaults_bracket_reference() {
        assert!(DEFAULT_START_PREMIUM > WAD);
        assert!(DEFAULT_END_DISCOUNT < WAD);
        assert!(DEFAULT_END_DISCOUNT > 0);
    }
}
